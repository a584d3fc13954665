//! UART line configuration
//!
//! Describes how a serial line is framed. Drivers translate these values
//! into whatever their OS or hardware layer expects.

use core::fmt;
use core::str::FromStr;

/// Conventional baud rates
///
/// Any other positive rate is still accepted and passed through to the
/// driver untouched.
pub const STANDARD_BAUD_RATES: [u32; 17] = [
    115_200, 57_600, 38_400, 19_200, 9_600, 4_800, 2_400, 1_800, 1_200, 600, 300, 200, 150, 134,
    110, 75, 50,
];

/// Default baud rate for a freshly configured UART
pub const DEFAULT_BAUD_RATE: u32 = 9_600;

/// Returns true if `baud` is one of [`STANDARD_BAUD_RATES`]
pub fn is_standard_baud_rate(baud: u32) -> bool {
    STANDARD_BAUD_RATES.contains(&baud)
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits per frame
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl UartConfig {
    /// Build a config, rejecting a zero baud rate
    pub fn new(
        baudrate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
    ) -> Result<Self, UartConfigError> {
        if baudrate == 0 {
            return Err(UartConfigError::InvalidBaudRate);
        }
        Ok(Self {
            baudrate,
            data_bits,
            parity,
            stop_bits,
        })
    }
}

/// Error for out-of-range line settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartConfigError {
    /// Baud rate must be positive
    InvalidBaudRate,
    /// Data bits outside 5-8
    InvalidDataBits(u8),
    /// Stop bits other than 1 or 2
    InvalidStopBits(u8),
    /// Unknown parity name
    InvalidParity,
}

impl fmt::Display for UartConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UartConfigError::InvalidBaudRate => f.write_str("baud rate must be a positive integer"),
            UartConfigError::InvalidDataBits(n) => write!(f, "invalid data bits {n}, expected 5-8"),
            UartConfigError::InvalidStopBits(n) => write!(f, "invalid stop bits {n}, expected 1 or 2"),
            UartConfigError::InvalidParity => {
                f.write_str("invalid parity, expected none, even, odd, mark or space")
            }
        }
    }
}

impl core::error::Error for UartConfigError {}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    /// Bit count as a plain integer
    pub fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = UartConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(UartConfigError::InvalidDataBits(other)),
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
    /// Parity bit always 1
    Mark,
    /// Parity bit always 0
    Space,
}

impl Parity {
    /// Lower-case name used in configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            Parity::None => "none",
            Parity::Even => "even",
            Parity::Odd => "odd",
            Parity::Mark => "mark",
            Parity::Space => "space",
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parity {
    type Err = UartConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Parity::None),
            "even" => Ok(Parity::Even),
            "odd" => Ok(Parity::Odd),
            "mark" => Ok(Parity::Mark),
            "space" => Ok(Parity::Space),
            _ => Err(UartConfigError::InvalidParity),
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    /// Stop bit count as a plain integer
    pub fn bits(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl TryFrom<u8> for StopBits {
    type Error = UartConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(UartConfigError::InvalidStopBits(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_is_9600_8n1() {
        let config = UartConfig::default();
        assert_eq!(config.baudrate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
    }

    #[test]
    fn test_zero_baud_rejected() {
        let result = UartConfig::new(0, DataBits::Eight, Parity::None, StopBits::One);
        assert_eq!(result, Err(UartConfigError::InvalidBaudRate));
    }

    #[test]
    fn test_non_standard_baud_accepted() {
        let config = UartConfig::new(250_000, DataBits::Eight, Parity::None, StopBits::One).unwrap();
        assert_eq!(config.baudrate, 250_000);
        assert!(!is_standard_baud_rate(250_000));
        assert!(is_standard_baud_rate(19_200));
    }

    #[test]
    fn test_parity_names() {
        for parity in [Parity::None, Parity::Even, Parity::Odd, Parity::Mark, Parity::Space] {
            assert_eq!(parity.as_str().parse::<Parity>(), Ok(parity));
        }
        assert_eq!("EVEN".parse::<Parity>(), Err(UartConfigError::InvalidParity));
    }

    #[test]
    fn test_stop_bits() {
        assert_eq!(StopBits::try_from(1), Ok(StopBits::One));
        assert_eq!(StopBits::try_from(2), Ok(StopBits::Two));
        assert_eq!(StopBits::try_from(3), Err(UartConfigError::InvalidStopBits(3)));
    }

    proptest! {
        #[test]
        fn data_bits_only_five_to_eight(bits in any::<u8>()) {
            match DataBits::try_from(bits) {
                Ok(db) => prop_assert_eq!(db.bits(), bits),
                Err(e) => {
                    prop_assert!(!(5..=8).contains(&bits));
                    prop_assert_eq!(e, UartConfigError::InvalidDataBits(bits));
                }
            }
        }
    }
}
