//! Serial port discovery

use log::debug;

/// Description of a serial device present on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path, e.g. `/dev/ttyAMA0`
    pub path: String,
    /// True for USB-attached adapters
    pub usb: bool,
}

/// List serial devices the OS currently reports
pub fn available_ports() -> serialport::Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    debug!("Found {} serial ports", ports.len());
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            usb: matches!(p.port_type, serialport::SerialPortType::UsbPort(_)),
            path: p.port_name,
        })
        .collect())
}
