//! Mapping of line settings onto `serialport`

use std::time::Duration;

use pinserial_hal::{DataBits, Parity, StopBits, UartConfig};
use serialport::{ErrorKind, SerialPortBuilder};

/// Read timeout used by the worker between command checks
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Build a `serialport` builder for `port` with `config`
///
/// Fails for parity modes the OS layer cannot express.
pub fn port_builder(port: &str, config: &UartConfig) -> serialport::Result<SerialPortBuilder> {
    Ok(serialport::new(port, config.baudrate)
        .data_bits(data_bits(config.data_bits))
        .stop_bits(stop_bits(config.stop_bits))
        .parity(parity(config.parity)?)
        .timeout(READ_POLL_INTERVAL))
}

/// Convert data bits
pub fn data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

/// Convert stop bits
pub fn stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

/// Convert parity
///
/// `serialport` has no mark or space parity.
pub fn parity(parity: Parity) -> serialport::Result<serialport::Parity> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Mark | Parity::Space => Err(serialport::Error::new(
            ErrorKind::InvalidInput,
            format!("{parity} parity is not supported by the Linux serial driver"),
        )),
    }
}
