//! Linux serial driver for pinserial
//!
//! This crate implements the `pinserial-hal` driver contract for hosts
//! with an OS serial device (e.g. `/dev/ttyAMA0` on a Raspberry Pi):
//!
//! - Port configuration mapping onto the `serialport` crate
//! - One worker thread per connection doing blocking device I/O
//! - Event delivery to the single-threaded peripheral side
//! - Port enumeration

#![deny(unsafe_code)]

pub mod config;
pub mod driver;
pub mod ports;
mod worker;

pub use driver::{LinuxConnection, LinuxSerial};
pub use ports::{available_ports, PortInfo};

// Re-export the error type drivers report through completions
pub use serialport::Error;
