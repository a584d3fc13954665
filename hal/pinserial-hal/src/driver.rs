//! Serial driver collaborator contract
//!
//! A [`SerialDriver`] creates connections; a [`SerialConnection`] accepts
//! requests without blocking and reports their outcomes later as
//! [`DriverEvent`]s. Every request produces exactly one completion event,
//! and completions of the same kind are reported in request order.

use core::task::{Context, Poll};

use heapless::Vec;

use crate::uart::UartConfig;

/// Maximum number of bytes carried by a single [`DriverEvent::Data`]
pub const RX_CHUNK_SIZE: usize = 64;

/// One delivery of received bytes
pub type DataChunk = Vec<u8, RX_CHUNK_SIZE>;

/// Options handed to [`SerialDriver::open_connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenOptions {
    /// Line settings
    pub config: UartConfig,
    /// Request an OS-level exclusive lock on the device
    pub exclusive: bool,
}

impl OpenOptions {
    /// Options for `config` without exclusive locking
    pub fn shared(config: UartConfig) -> Self {
        Self {
            config,
            exclusive: false,
        }
    }
}

/// Asynchronous notifications from a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent<E> {
    /// The open handshake finished
    Opened(Result<(), E>),
    /// Bytes arrived on the line
    Data(DataChunk),
    /// A write request completed
    Written(Result<(), E>),
    /// A flush request completed
    Flushed(Result<(), E>),
    /// A drain request completed
    Drained(Result<(), E>),
    /// The connection is closed; no further events follow
    Closed(Result<(), E>),
    /// An error not tied to any request (e.g. a failed read)
    Error(E),
}

/// Factory for serial connections
pub trait SerialDriver {
    /// Transport error reported through completions
    type Error: Clone + core::fmt::Debug + 'static;

    /// Connection type produced by this driver
    type Connection: SerialConnection<Error = Self::Error> + 'static;

    /// Start opening `port`
    ///
    /// Returns immediately. The outcome is reported later as
    /// [`DriverEvent::Opened`] on the returned connection.
    fn open_connection(&mut self, port: &str, options: &OpenOptions) -> Self::Connection;

    /// Error for requests left unanswered when a connection ends
    ///
    /// Used when a connection reports [`DriverEvent::Closed`] with `Ok(())`
    /// or stops producing events while an open or I/O request is pending.
    fn disconnected(&self) -> Self::Error;
}

/// One connection to a serial device
pub trait SerialConnection {
    /// Transport error reported through completions
    type Error;

    /// Queue `data` for transmission; completes with [`DriverEvent::Written`]
    fn write(&mut self, data: &[u8]);

    /// Discard pending input and output; completes with [`DriverEvent::Flushed`]
    fn flush(&mut self);

    /// Wait for queued output to be transmitted; completes with [`DriverEvent::Drained`]
    fn drain(&mut self);

    /// Close the device; completes with [`DriverEvent::Closed`]
    fn close(&mut self);

    /// Take the next pending event without waiting
    fn try_event(&mut self) -> Option<DriverEvent<Self::Error>>;

    /// Poll for the next event
    ///
    /// Returns `Ready(None)` once the connection has terminated and no
    /// further events will arrive.
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<DriverEvent<Self::Error>>>;
}
