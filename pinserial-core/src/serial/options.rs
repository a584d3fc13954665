//! Serial configuration
//!
//! [`SerialOptions`] carries optional overrides, typically from code or a
//! TOML file. [`SerialOptions::resolve`] fills in defaults and validates,
//! producing the immutable [`SerialConfig`] a peripheral is built with.

use pinserial_hal::{DataBits, Parity, StopBits, UartConfig};
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::peripheral::PinId;

/// Serial device on the GPIO header of the board
pub const DEFAULT_PORT: &str = "/dev/ttyAMA0";

/// Header pin carrying transmitted data on the default port
pub const TX_PIN: PinId = "TXD0";

/// Header pin carrying received data on the default port
pub const RX_PIN: PinId = "RXD0";

const DEFAULT_PORT_PINS: [PinId; 2] = [TX_PIN, RX_PIN];

/// Resolved, immutable serial configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Serial device path
    pub port_id: String,
    /// Line settings
    pub uart: UartConfig,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_id: DEFAULT_PORT.to_owned(),
            uart: UartConfig::default(),
        }
    }
}

impl SerialConfig {
    /// Check if this configuration targets the header UART
    pub fn is_default_port(&self) -> bool {
        self.port_id == DEFAULT_PORT
    }

    /// Header pins used by this configuration
    ///
    /// Only the default port maps to known pins; other devices claim none.
    pub fn pins(&self) -> &'static [PinId] {
        if self.is_default_port() {
            &DEFAULT_PORT_PINS
        } else {
            &[]
        }
    }
}

/// Optional configuration overrides
///
/// Unset fields take the defaults of [`SerialConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialOptions {
    pub port_id: Option<String>,
    pub baud_rate: Option<u32>,
    pub data_bits: Option<u8>,
    pub stop_bits: Option<u8>,
    #[serde(deserialize_with = "parity_name")]
    pub parity: Option<Parity>,
}

impl SerialOptions {
    /// Options with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port_id(mut self, port_id: impl Into<String>) -> Self {
        self.port_id = Some(port_id.into());
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub fn data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = Some(data_bits);
        self
    }

    pub fn stop_bits(mut self, stop_bits: u8) -> Self {
        self.stop_bits = Some(stop_bits);
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = Some(parity);
        self
    }

    /// Parse options from a TOML document
    ///
    /// Keys may sit in a `[serial]` table or at the top level:
    ///
    /// ```toml
    /// [serial]
    /// port_id = "/dev/ttyUSB0"
    /// baud_rate = 115200
    /// parity = "even"
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(input)?;
        let options = match table.remove("serial") {
            Some(section) => section.try_into()?,
            None => toml::Value::Table(table).try_into()?,
        };
        Ok(options)
    }

    /// Fill in defaults and validate
    pub fn resolve(self) -> Result<SerialConfig, ConfigError> {
        let defaults = SerialConfig::default();

        let data_bits = match self.data_bits {
            Some(bits) => DataBits::try_from(bits)?,
            None => defaults.uart.data_bits,
        };
        let stop_bits = match self.stop_bits {
            Some(bits) => StopBits::try_from(bits)?,
            None => defaults.uart.stop_bits,
        };
        let uart = UartConfig::new(
            self.baud_rate.unwrap_or(defaults.uart.baudrate),
            data_bits,
            self.parity.unwrap_or(defaults.uart.parity),
            stop_bits,
        )?;

        Ok(SerialConfig {
            port_id: self.port_id.unwrap_or(defaults.port_id),
            uart,
        })
    }
}

fn parity_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Parity>, D::Error> {
    let name: Option<String> = Option::deserialize(deserializer)?;
    name.map(|n| n.parse().map_err(serde::de::Error::custom))
        .transpose()
}
