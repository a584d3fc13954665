//! UART peripheral facade for single-board computers
//!
//! This crate exposes the serial port on a board's GPIO header as a
//! peripheral object with an explicit lifecycle:
//!
//! - Pin bookkeeping and aliveness checks ([`peripheral`])
//! - Board context with shutdown-time teardown ([`board`], [`shutdown`])
//! - Deferred operation results ([`completion`])
//! - The serial peripheral itself ([`serial`])
//!
//! All serial I/O is delegated to a `pinserial_hal::SerialDriver`. The
//! peripheral is single-threaded: operations either fail immediately or
//! return a [`Completion`] that resolves during a later
//! [`SerialPeripheral::dispatch`] call.
//!
//! ```ignore
//! let board = Board::new();
//! let serial = SerialPeripheral::new(&board, LinuxSerial::new(), SerialOptions::new())?;
//! serial.on_data(|chunk| println!("{:?}", chunk));
//! serial.open()?.then(|result| log::info!("open: {:?}", result));
//! block_on(serial.run())?;
//! ```

#![deny(unsafe_code)]

pub mod board;
pub mod completion;
pub mod error;
pub mod peripheral;
pub mod serial;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod mock;

pub use board::Board;
pub use completion::Completion;
pub use error::{ConfigError, PeripheralError};
pub use peripheral::{Peripheral, PeripheralId, PinError, PinId};
pub use serial::{
    LinkState, Payload, SerialConfig, SerialEvent, SerialOptions, SerialPeripheral, SerialResult,
    DEFAULT_PORT, RX_PIN, TX_PIN,
};
