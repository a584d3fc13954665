//! UART serial peripheral
//!
//! [`SerialPeripheral`] puts the board's serial port behind the peripheral
//! lifecycle. It claims the header pins of the default port, tracks the
//! connection state and forwards I/O to a [`SerialDriver`].
//!
//! # Threading model
//!
//! Everything runs on one thread. Operations return immediately with
//! either a synchronous error or a [`Completion`]. Completions resolve and
//! data listeners run only inside [`SerialPeripheral::dispatch`], which
//! [`SerialPeripheral::run`] calls whenever the driver has news. No
//! callback runs inside the call that started the operation, even when the
//! outcome is already known.
//!
//! # Open and close
//!
//! At most one open or close is in flight. A request matching the one in
//! flight joins it; any other request waits its turn and is replayed, in
//! order, once the link settles.

pub mod options;
pub mod state;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::poll_fn;
use std::mem;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use embassy_sync::waitqueue::WakerRegistration;
use log::{debug, trace, warn};
use pinserial_hal::{
    is_standard_baud_rate, DataBits, DataChunk, DriverEvent, OpenOptions, Parity,
    SerialConnection, SerialDriver, StopBits,
};

use crate::board::Board;
use crate::completion::{self, Completion, Responder};
use crate::error::PeripheralError;
use crate::peripheral::{ListenerId, Peripheral, PeripheralBase, PeripheralId, PinId};

pub use options::{SerialConfig, SerialOptions, DEFAULT_PORT, RX_PIN, TX_PIN};
pub use state::{LinkEvent, LinkState};

/// Outcome delivered by serial completions
pub type SerialResult<E> = Result<(), E>;

/// Events emitted to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialEvent<E> {
    /// Bytes received, in arrival order
    Data(DataChunk),
    /// Driver error not tied to a request
    Error(E),
}

/// Data accepted by [`SerialPeripheral::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
}

impl<'a> Payload<'a> {
    /// Raw bytes to transmit; text is sent as UTF-8
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) => text.as_bytes(),
        }
    }
}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Payload<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Payload<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Payload::Text(text)
    }
}

impl<'a> From<&'a String> for Payload<'a> {
    fn from(text: &'a String) -> Self {
        Payload::Text(text)
    }
}

type Waiter<E> = Responder<SerialResult<E>>;

/// Open or close waiting for the link to settle
enum Request<E> {
    Open(Waiter<E>),
    Close(Waiter<E>),
}

/// What became of a request handed to the link
enum Applied<E> {
    /// Started or joined a driver transition
    Pending,
    /// Already satisfied by the current state
    Ready(Waiter<E>),
    /// Conflicts with the transition in flight
    Blocked(Request<E>),
}

#[derive(Debug, Clone, Copy)]
enum Io {
    Write,
    Flush,
    Drain,
}

impl Io {
    fn name(self) -> &'static str {
        match self {
            Io::Write => "write",
            Io::Flush => "flush",
            Io::Drain => "drain",
        }
    }
}

struct Link<D: SerialDriver> {
    state: LinkState,
    connection: Option<D::Connection>,
    opening: Vec<Waiter<D::Error>>,
    closing: Vec<Waiter<D::Error>>,
    writes: VecDeque<Waiter<D::Error>>,
    flushes: VecDeque<Waiter<D::Error>>,
    drains: VecDeque<Waiter<D::Error>>,
    queued: VecDeque<Request<D::Error>>,
    /// Requests already satisfied, resolved on the next dispatch
    deferred: Vec<Waiter<D::Error>>,
    /// Events picked up while polling, not yet dispatched
    inbox: VecDeque<DriverEvent<D::Error>>,
    waker: WakerRegistration,
}

impl<D: SerialDriver> Link<D> {
    fn new() -> Self {
        Self {
            state: LinkState::default(),
            connection: None,
            opening: Vec::new(),
            closing: Vec::new(),
            writes: VecDeque::new(),
            flushes: VecDeque::new(),
            drains: VecDeque::new(),
            queued: VecDeque::new(),
            deferred: Vec::new(),
            inbox: VecDeque::new(),
            waker: WakerRegistration::new(),
        }
    }

    fn pending(&mut self, io: Io) -> &mut VecDeque<Waiter<D::Error>> {
        match io {
            Io::Write => &mut self.writes,
            Io::Flush => &mut self.flushes,
            Io::Drain => &mut self.drains,
        }
    }

    /// Take the I/O waiters of a connection that is gone
    fn take_io_waiters(&mut self) -> Vec<Waiter<D::Error>> {
        let mut waiters: Vec<_> = self.writes.drain(..).collect();
        waiters.extend(self.flushes.drain(..));
        waiters.extend(self.drains.drain(..));
        waiters
    }
}

struct Inner<D: SerialDriver> {
    base: PeripheralBase<SerialEvent<D::Error>>,
    config: SerialConfig,
    driver: RefCell<D>,
    link: RefCell<Link<D>>,
    dispatching: Cell<bool>,
}

impl<D: SerialDriver> Inner<D> {
    fn submit(&self, request: Request<D::Error>) -> Result<(), PeripheralError> {
        let mut link = self.link.borrow_mut();
        if !link.queued.is_empty() {
            link.queued.push_back(request);
            return Ok(());
        }

        match self.apply(&mut link, request)? {
            Applied::Pending => {}
            Applied::Ready(waiter) => {
                link.deferred.push(waiter);
                link.waker.wake();
            }
            Applied::Blocked(request) => link.queued.push_back(request),
        }
        Ok(())
    }

    fn apply(
        &self,
        link: &mut Link<D>,
        request: Request<D::Error>,
    ) -> Result<Applied<D::Error>, PeripheralError> {
        match (link.state, request) {
            (LinkState::Open, Request::Open(waiter)) | (LinkState::Closed, Request::Close(waiter)) => {
                Ok(Applied::Ready(waiter))
            }
            (LinkState::Opening, Request::Open(waiter)) => {
                link.opening.push(waiter);
                Ok(Applied::Pending)
            }
            (LinkState::Closing, Request::Close(waiter)) => {
                link.closing.push(waiter);
                Ok(Applied::Pending)
            }
            (LinkState::Closed, Request::Open(waiter)) => {
                self.begin_open(link);
                link.opening.push(waiter);
                Ok(Applied::Pending)
            }
            (LinkState::Open, Request::Close(waiter)) => {
                self.begin_close(link)?;
                link.closing.push(waiter);
                Ok(Applied::Pending)
            }
            (state, request) => {
                debug_assert!(state.is_transitioning());
                trace!("{} is {:?}, request queued", self.config.port_id, state);
                Ok(Applied::Blocked(request))
            }
        }
    }

    fn begin_open(&self, link: &mut Link<D>) {
        let uart = self.config.uart;
        debug!(
            "Opening {} at {} baud, {} data bits, {} parity, {} stop bits",
            self.config.port_id,
            uart.baudrate,
            uart.data_bits.bits(),
            uart.parity,
            uart.stop_bits.bits()
        );
        if !is_standard_baud_rate(uart.baudrate) {
            debug!("{} baud is not a standard rate", uart.baudrate);
        }

        let options = OpenOptions::shared(uart);
        let connection = self
            .driver
            .borrow_mut()
            .open_connection(&self.config.port_id, &options);
        link.connection = Some(connection);
        link.state = link.state.transition(LinkEvent::OpenRequested);
        link.waker.wake();
    }

    fn begin_close(&self, link: &mut Link<D>) -> Result<(), PeripheralError> {
        let connection = link
            .connection
            .as_mut()
            .ok_or(PeripheralError::Internal("open serial link has no connection"))?;
        connection.close();
        link.state = link.state.transition(LinkEvent::CloseRequested);
        debug!("Closing {}", self.config.port_id);
        Ok(())
    }

    /// Replay queued opens and closes until one has to wait
    fn replay(&self) -> Result<(), PeripheralError> {
        loop {
            let ready = {
                let mut link = self.link.borrow_mut();
                let Some(request) = link.queued.pop_front() else {
                    return Ok(());
                };
                match self.apply(&mut link, request)? {
                    Applied::Pending => continue,
                    Applied::Ready(waiter) => waiter,
                    Applied::Blocked(request) => {
                        link.queued.push_front(request);
                        return Ok(());
                    }
                }
            };
            ready.resolve(Ok(()));
        }
    }

    fn start_io(
        &self,
        io: Io,
        data: &[u8],
    ) -> Result<Completion<SerialResult<D::Error>>, PeripheralError> {
        self.base.validate_alive()?;

        let mut link = self.link.borrow_mut();
        if !link.state.is_open() {
            return Err(PeripheralError::NotOpen {
                operation: io.name(),
            });
        }
        let connection = link
            .connection
            .as_mut()
            .ok_or(PeripheralError::Internal("open serial link has no connection"))?;

        match io {
            Io::Write => {
                trace!("{} TX: {} bytes", self.config.port_id, data.len());
                connection.write(data);
            }
            Io::Flush => connection.flush(),
            Io::Drain => connection.drain(),
        }

        let (waiter, completion) = completion::pair();
        link.pending(io).push_back(waiter);
        Ok(completion)
    }

    fn dispatch(&self) -> Result<usize, PeripheralError> {
        if self.dispatching.replace(true) {
            return Ok(0);
        }
        let result = self.dispatch_pending();
        self.dispatching.set(false);
        result
    }

    fn dispatch_pending(&self) -> Result<usize, PeripheralError> {
        let deferred = mem::take(&mut self.link.borrow_mut().deferred);
        let mut handled = deferred.len();
        for waiter in deferred {
            waiter.resolve(Ok(()));
        }

        while let Some(event) = self.next_event() {
            self.handle(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    fn next_event(&self) -> Option<DriverEvent<D::Error>> {
        let mut link = self.link.borrow_mut();
        if let Some(event) = link.inbox.pop_front() {
            return Some(event);
        }
        link.connection.as_mut()?.try_event()
    }

    fn handle(&self, event: DriverEvent<D::Error>) -> Result<(), PeripheralError> {
        let port = &self.config.port_id;

        match event {
            DriverEvent::Opened(Ok(())) => {
                let waiters = {
                    let mut link = self.link.borrow_mut();
                    link.state = link.state.transition(LinkEvent::Opened);
                    mem::take(&mut link.opening)
                };
                debug!("{} open", port);
                for waiter in waiters {
                    waiter.resolve(Ok(()));
                }
                self.replay()
            }
            DriverEvent::Opened(Err(error)) => {
                let waiters = {
                    let mut link = self.link.borrow_mut();
                    link.state = link.state.transition(LinkEvent::OpenFailed);
                    link.connection = None;
                    mem::take(&mut link.opening)
                };
                warn!("Failed to open {}: {:?}", port, error);
                for waiter in waiters {
                    waiter.resolve(Err(error.clone()));
                }
                self.replay()
            }
            DriverEvent::Data(chunk) => {
                trace!("{} RX: {} bytes", port, chunk.len());
                self.base.emit(&SerialEvent::Data(chunk));
                Ok(())
            }
            DriverEvent::Error(error) => {
                warn!("{} driver error: {:?}", port, error);
                self.base.emit(&SerialEvent::Error(error));
                Ok(())
            }
            DriverEvent::Written(result) => self.complete_io(Io::Write, result),
            DriverEvent::Flushed(result) => self.complete_io(Io::Flush, result),
            DriverEvent::Drained(result) => self.complete_io(Io::Drain, result),
            DriverEvent::Closed(result) => {
                let (previous, closing, unanswered) = {
                    let mut link = self.link.borrow_mut();
                    let previous = link.state;
                    link.state = link.state.transition(LinkEvent::Closed);
                    link.connection = None;
                    let mut unanswered = mem::take(&mut link.opening);
                    unanswered.extend(link.take_io_waiters());
                    (previous, mem::take(&mut link.closing), unanswered)
                };

                if previous == LinkState::Closing {
                    debug!("{} closed", port);
                } else {
                    warn!("{} connection ended while {:?}", port, previous);
                }

                if !unanswered.is_empty() {
                    let error = match &result {
                        Err(error) => error.clone(),
                        Ok(()) => self.driver.borrow().disconnected(),
                    };
                    warn!("{} failing {} unanswered requests", port, unanswered.len());
                    for waiter in unanswered {
                        waiter.resolve(Err(error.clone()));
                    }
                }
                for waiter in closing {
                    waiter.resolve(result.clone());
                }
                self.replay()
            }
        }
    }

    fn complete_io(&self, io: Io, result: SerialResult<D::Error>) -> Result<(), PeripheralError> {
        if let Err(error) = &result {
            warn!("{} {} failed: {:?}", self.config.port_id, io.name(), error);
        }
        let waiter = self.link.borrow_mut().pending(io).pop_front();
        match waiter {
            Some(waiter) => {
                waiter.resolve(result);
                Ok(())
            }
            None => Err(PeripheralError::Internal(
                "driver completed a request that was never made",
            )),
        }
    }

    /// Check if nothing is left to do for a destroyed peripheral
    fn is_finished(&self, link: &Link<D>) -> bool {
        !self.base.is_alive()
            && link.connection.is_none()
            && link.queued.is_empty()
            && link.deferred.is_empty()
            && link.inbox.is_empty()
    }

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<()> {
        let mut link = self.link.borrow_mut();
        if !link.deferred.is_empty() || !link.inbox.is_empty() || self.is_finished(&link) {
            return Poll::Ready(());
        }

        link.waker.register(cx.waker());
        let Some(connection) = link.connection.as_mut() else {
            return Poll::Pending;
        };
        match connection.poll_event(cx) {
            Poll::Ready(Some(event)) => {
                link.inbox.push_back(event);
                Poll::Ready(())
            }
            Poll::Ready(None) => {
                warn!("{} connection ended without a close", self.config.port_id);
                link.inbox.push_back(DriverEvent::Closed(Ok(())));
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<D: SerialDriver> Peripheral for Inner<D> {
    fn id(&self) -> PeripheralId {
        self.base.id()
    }

    fn pins(&self) -> &[PinId] {
        self.base.pins()
    }

    fn is_alive(&self) -> bool {
        self.base.is_alive()
    }

    fn destroy(&self) {
        if !self.base.is_alive() {
            return;
        }

        let (waiter, completion) = completion::pair();
        completion.ignore();
        if let Err(e) = self.submit(Request::Close(waiter)) {
            warn!("Closing {} during destroy failed: {}", self.config.port_id, e);
        }
        self.base.destroy();
    }
}

/// Serial port on a board
///
/// Cloning yields another handle to the same peripheral.
pub struct SerialPeripheral<D: SerialDriver> {
    inner: Rc<Inner<D>>,
}

impl<D: SerialDriver> Clone for SerialPeripheral<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: SerialDriver + 'static> SerialPeripheral<D> {
    /// Create a peripheral from optional overrides
    ///
    /// The port stays closed until [`open`](Self::open) is called. Fails
    /// if the options are invalid or the pins are held by another
    /// peripheral.
    pub fn new(board: &Board, driver: D, options: SerialOptions) -> Result<Self, PeripheralError> {
        let config = options.resolve()?;
        Self::with_config(board, driver, config)
    }

    /// Create a peripheral from a resolved configuration
    pub fn with_config(
        board: &Board,
        driver: D,
        config: SerialConfig,
    ) -> Result<Self, PeripheralError> {
        let base = PeripheralBase::new(board.pins().clone(), config.pins())?;
        debug!("Serial peripheral {} on {}", base.id(), config.port_id);

        let inner = Rc::new(Inner {
            base,
            config,
            driver: RefCell::new(driver),
            link: RefCell::new(Link::new()),
            dispatching: Cell::new(false),
        });
        let weak: Weak<Inner<D>> = Rc::downgrade(&inner);
        board.register(weak);

        Ok(Self { inner })
    }
}

impl<D: SerialDriver> SerialPeripheral<D> {
    pub fn port(&self) -> &str {
        &self.inner.config.port_id
    }

    pub fn baud_rate(&self) -> u32 {
        self.inner.config.uart.baudrate
    }

    pub fn data_bits(&self) -> DataBits {
        self.inner.config.uart.data_bits
    }

    pub fn stop_bits(&self) -> StopBits {
        self.inner.config.uart.stop_bits
    }

    pub fn parity(&self) -> Parity {
        self.inner.config.uart.parity
    }

    pub fn config(&self) -> &SerialConfig {
        &self.inner.config
    }

    /// Check if reads and writes are currently allowed
    ///
    /// Becomes false as soon as a close is requested.
    pub fn is_open(&self) -> bool {
        self.inner.link.borrow().state.is_open()
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.inner.link.borrow().state
    }

    /// Open the port
    ///
    /// Completes with the driver's verdict. If the port is already open
    /// the completion succeeds on the next dispatch without touching the
    /// driver.
    pub fn open(&self) -> Result<Completion<SerialResult<D::Error>>, PeripheralError> {
        self.inner.base.validate_alive()?;
        let (waiter, completion) = completion::pair();
        self.inner.submit(Request::Open(waiter))?;
        Ok(completion)
    }

    /// Close the port
    ///
    /// [`is_open`](Self::is_open) turns false immediately; the completion
    /// resolves once the driver confirms.
    pub fn close(&self) -> Result<Completion<SerialResult<D::Error>>, PeripheralError> {
        self.inner.base.validate_alive()?;
        let (waiter, completion) = completion::pair();
        self.inner.submit(Request::Close(waiter))?;
        Ok(completion)
    }

    /// Transmit bytes or text
    pub fn write<'a>(
        &self,
        data: impl Into<Payload<'a>>,
    ) -> Result<Completion<SerialResult<D::Error>>, PeripheralError> {
        self.inner.start_io(Io::Write, data.into().as_bytes())
    }

    /// Discard data buffered in either direction
    pub fn flush(&self) -> Result<Completion<SerialResult<D::Error>>, PeripheralError> {
        self.inner.start_io(Io::Flush, &[])
    }

    /// Wait until buffered output has been transmitted
    pub fn drain(&self) -> Result<Completion<SerialResult<D::Error>>, PeripheralError> {
        self.inner.start_io(Io::Drain, &[])
    }

    /// Listen for received bytes
    pub fn on_data(&self, mut listener: impl FnMut(&[u8]) + 'static) -> ListenerId {
        self.inner.base.on(move |event| {
            if let SerialEvent::Data(chunk) = event {
                listener(&chunk[..]);
            }
        })
    }

    /// Listen for every event, including driver errors
    pub fn on_event(&self, listener: impl FnMut(&SerialEvent<D::Error>) + 'static) -> ListenerId {
        self.inner.base.on(listener)
    }

    /// Remove a listener
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.base.off(id)
    }

    /// Deliver everything that is ready
    ///
    /// Resolves completions and runs listeners for all events the driver
    /// has reported so far. Returns how many were handled. Calls made from
    /// inside a callback return `Ok(0)`.
    ///
    /// Keeps working after destroy so that teardown can finish.
    pub fn dispatch(&self) -> Result<usize, PeripheralError> {
        self.inner.dispatch()
    }

    /// Dispatch whenever the driver has news
    ///
    /// Returns after the peripheral is destroyed and its connection has
    /// closed.
    pub async fn run(&self) -> Result<(), PeripheralError> {
        loop {
            self.inner.dispatch()?;
            if self.inner.is_finished(&self.inner.link.borrow()) {
                debug!("{} dispatch loop finished", self.inner.config.port_id);
                return Ok(());
            }
            poll_fn(|cx| self.inner.poll_ready(cx)).await;
        }
    }
}

impl<D: SerialDriver> Peripheral for SerialPeripheral<D> {
    fn id(&self) -> PeripheralId {
        self.inner.id()
    }

    fn pins(&self) -> &[PinId] {
        self.inner.pins()
    }

    fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// Close the port if needed, release the pins and refuse further
    /// operations
    fn destroy(&self) {
        self.inner.destroy();
    }
}

impl<D: SerialDriver> core::fmt::Debug for SerialPeripheral<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerialPeripheral")
            .field("id", &self.inner.base.id())
            .field("port", &self.inner.config.port_id)
            .field("state", &self.state())
            .field("alive", &self.inner.base.is_alive())
            .finish()
    }
}
