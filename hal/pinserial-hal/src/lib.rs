//! pinserial Hardware Abstraction Layer
//!
//! This crate defines the types and traits shared between the serial
//! peripheral facade and the platform drivers that perform the actual
//! serial I/O. The facade never talks to a device directly; it hands a
//! [`uart::UartConfig`] to a [`driver::SerialDriver`] and reacts to the
//! [`driver::DriverEvent`]s the resulting connection reports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  pinserial-core (SerialPeripheral)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pinserial-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ pinserial-    │       │  test / mock  │
//! │  hal-linux    │       │    drivers    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`driver::SerialDriver`] - Creates connections to serial devices
//! - [`driver::SerialConnection`] - Non-blocking operations on one open device

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod driver;
pub mod uart;

// Re-export key items at crate root for convenience
pub use driver::{DataChunk, DriverEvent, OpenOptions, SerialConnection, SerialDriver, RX_CHUNK_SIZE};
pub use uart::{
    is_standard_baud_rate, DataBits, Parity, StopBits, UartConfig, UartConfigError,
    STANDARD_BAUD_RATES,
};
