//! Error types
//!
//! Only synchronous failures live here. Transport errors reported by the
//! driver reach callers through completions as the driver's own error type.

use pinserial_hal::UartConfigError;

use crate::peripheral::PinError;

/// Synchronous failure of a peripheral operation
#[derive(Debug, thiserror::Error)]
pub enum PeripheralError {
    /// Operation on a peripheral that has been destroyed
    #[error("peripheral has already been destroyed")]
    Destroyed,
    /// Operation that needs an open port while the port is closed
    #[error("attempted to {operation} a closed serial port")]
    NotOpen { operation: &'static str },
    /// Pins required by the peripheral are held by another peripheral
    #[error(transparent)]
    Pin(#[from] PinError),
    /// Options could not be resolved into a configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Bookkeeping no longer matches what the driver reported
    #[error("internal error: {0}. This is a bug in pinserial, please report it")]
    Internal(&'static str),
}

impl PeripheralError {
    /// Returns true for lifecycle violations
    pub fn is_destroyed(&self) -> bool {
        matches!(self, PeripheralError::Destroyed)
    }

    /// Returns true for operations rejected because the port is closed
    pub fn is_not_open(&self) -> bool {
        matches!(self, PeripheralError::NotOpen { .. })
    }
}

/// Invalid serial configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A line setting is out of range
    #[error(transparent)]
    Uart(#[from] UartConfigError),
    /// The configuration document could not be parsed
    #[error("invalid serial configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            PeripheralError::NotOpen { operation: "write" }.to_string(),
            "attempted to write a closed serial port"
        );
        assert!(PeripheralError::Internal("x").to_string().contains("report"));
        assert!(PeripheralError::Destroyed.is_destroyed());
        assert!(!PeripheralError::Destroyed.is_not_open());
    }

    #[test]
    fn test_config_error_wraps_uart() {
        let err = ConfigError::from(UartConfigError::InvalidStopBits(3));
        assert!(err.to_string().contains("stop bits 3"));
    }
}
