//! Connection worker thread
//!
//! Owns the OS device and performs all blocking I/O. Requests arrive on
//! the command channel and are executed in order between reads; every
//! outcome leaves as a `DriverEvent`.

use std::io::{self, Read, Write};
use std::thread;

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::executor::block_on;
use futures::StreamExt;
use log::{debug, trace, warn};
use pinserial_hal::{DataChunk, DriverEvent, OpenOptions, RX_CHUNK_SIZE};
use serialport::{ClearBuffer, ErrorKind, SerialPort};

use crate::config::{port_builder, READ_POLL_INTERVAL};

/// Requests sent from the connection handle
#[derive(Debug)]
pub(crate) enum Command {
    Write(Vec<u8>),
    Flush,
    Drain,
    Close,
}

type EventTx = UnboundedSender<DriverEvent<serialport::Error>>;

/// Worker entry point
pub(crate) fn run(
    port: String,
    options: OpenOptions,
    mut commands: UnboundedReceiver<Command>,
    events: EventTx,
) {
    let mut device = match open_device(&port, &options) {
        Ok(device) => {
            debug!("{} open", port);
            post(&events, DriverEvent::Opened(Ok(())));
            device
        }
        Err(e) => {
            warn!("Failed to open {}: {}", port, e);
            post(&events, DriverEvent::Opened(Err(e)));
            reject_commands(&mut commands, &events);
            return;
        }
    };

    let mut buf = [0u8; RX_CHUNK_SIZE];

    loop {
        if events.is_closed() {
            debug!("{} connection dropped, releasing device", port);
            return;
        }

        // Execute everything queued since the last read
        loop {
            match commands.try_next() {
                Ok(Some(Command::Close)) => {
                    drop(device);
                    debug!("{} closed", port);
                    post(&events, DriverEvent::Closed(Ok(())));
                    return;
                }
                Ok(Some(command)) => execute(device.as_mut(), command, &events),
                Ok(None) => {
                    debug!("{} connection dropped, releasing device", port);
                    return;
                }
                Err(_) => break,
            }
        }

        match device.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                trace!("{} RX: {} bytes", port, n);
                if let Ok(chunk) = DataChunk::from_slice(&buf[..n]) {
                    post(&events, DriverEvent::Data(chunk));
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => {
                warn!("{} read error: {}", port, e);
                post(&events, DriverEvent::Error(e.into()));
                thread::sleep(READ_POLL_INTERVAL);
            }
        }
    }
}

#[cfg(unix)]
fn open_device(port: &str, options: &OpenOptions) -> serialport::Result<Box<dyn SerialPort>> {
    let mut tty = port_builder(port, &options.config)?.open_native()?;
    tty.set_exclusive(options.exclusive)?;
    Ok(Box::new(tty))
}

#[cfg(not(unix))]
fn open_device(port: &str, options: &OpenOptions) -> serialport::Result<Box<dyn SerialPort>> {
    port_builder(port, &options.config)?.open()
}

fn execute(device: &mut dyn SerialPort, command: Command, events: &EventTx) {
    let completion = match command {
        Command::Write(bytes) => {
            trace!("TX: {} bytes", bytes.len());
            DriverEvent::Written(device.write_all(&bytes).map_err(Into::into))
        }
        Command::Flush => DriverEvent::Flushed(device.clear(ClearBuffer::All)),
        Command::Drain => DriverEvent::Drained(Write::flush(device).map_err(Into::into)),
        // Handled by the caller
        Command::Close => return,
    };
    post(events, completion);
}

/// Answer requests on a connection whose device never opened
fn reject_commands(commands: &mut UnboundedReceiver<Command>, events: &EventTx) {
    while let Some(command) = block_on(commands.next()) {
        let error = || serialport::Error::new(ErrorKind::NoDevice, "serial port is not open");
        let completion = match command {
            Command::Write(_) => DriverEvent::Written(Err(error())),
            Command::Flush => DriverEvent::Flushed(Err(error())),
            Command::Drain => DriverEvent::Drained(Err(error())),
            Command::Close => {
                post(events, DriverEvent::Closed(Ok(())));
                return;
            }
        };
        post(events, completion);
    }
}

fn post(events: &EventTx, event: DriverEvent<serialport::Error>) {
    if events.unbounded_send(event).is_err() {
        trace!("Event dropped, connection handle is gone");
    }
}
