//! `SerialDriver` implementation for OS serial devices

use std::task::{Context, Poll};
use std::thread;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use log::{debug, warn};
use pinserial_hal::{DriverEvent, OpenOptions, SerialConnection, SerialDriver};
use serialport::ErrorKind;

use crate::worker::{self, Command};

/// Driver for devices reachable through the OS serial layer
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxSerial;

impl LinuxSerial {
    /// Create a new driver
    pub fn new() -> Self {
        Self
    }
}

impl SerialDriver for LinuxSerial {
    type Error = serialport::Error;
    type Connection = LinuxConnection;

    fn open_connection(&mut self, port: &str, options: &OpenOptions) -> LinuxConnection {
        let (command_tx, command_rx) = mpsc::unbounded();
        let (event_tx, event_rx) = mpsc::unbounded();

        let worker_events = event_tx.clone();
        let worker_port = port.to_owned();
        let worker_options = *options;
        let spawned = thread::Builder::new()
            .name(format!("pinserial {port}"))
            .spawn(move || worker::run(worker_port, worker_options, command_rx, worker_events));

        if let Err(e) = spawned {
            warn!("Failed to start serial worker for {}: {}", port, e);
            let _ = event_tx.unbounded_send(DriverEvent::Opened(Err(e.into())));
        } else {
            debug!("Opening {} at {} baud", port, options.config.baudrate);
        }

        LinuxConnection {
            port: port.to_owned(),
            commands: command_tx,
            events: event_rx,
            local_events: event_tx,
        }
    }

    fn disconnected(&self) -> serialport::Error {
        serialport::Error::new(ErrorKind::NoDevice, "serial connection ended")
    }
}

/// Connection handle backed by a worker thread
///
/// Dropping the handle stops the worker and releases the device.
#[derive(Debug)]
pub struct LinuxConnection {
    port: String,
    commands: UnboundedSender<Command>,
    events: UnboundedReceiver<DriverEvent<serialport::Error>>,
    /// Used to complete requests the worker can no longer receive
    local_events: UnboundedSender<DriverEvent<serialport::Error>>,
}

impl LinuxConnection {
    /// Device path this connection was opened on
    pub fn port(&self) -> &str {
        &self.port
    }

    fn send(&mut self, command: Command) {
        if let Err(e) = self.commands.unbounded_send(command) {
            let error = serialport::Error::new(ErrorKind::NoDevice, "serial worker has stopped");
            let completion = match e.into_inner() {
                Command::Write(_) => DriverEvent::Written(Err(error)),
                Command::Flush => DriverEvent::Flushed(Err(error)),
                Command::Drain => DriverEvent::Drained(Err(error)),
                // Nothing left to release
                Command::Close => DriverEvent::Closed(Ok(())),
            };
            let _ = self.local_events.unbounded_send(completion);
        }
    }
}

impl SerialConnection for LinuxConnection {
    type Error = serialport::Error;

    fn write(&mut self, data: &[u8]) {
        self.send(Command::Write(data.to_vec()));
    }

    fn flush(&mut self) {
        self.send(Command::Flush);
    }

    fn drain(&mut self) {
        self.send(Command::Drain);
    }

    fn close(&mut self) {
        self.send(Command::Close);
    }

    fn try_event(&mut self) -> Option<DriverEvent<serialport::Error>> {
        self.events.try_next().ok().flatten()
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<DriverEvent<serialport::Error>>> {
        self.events.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use pinserial_hal::UartConfig;
    use std::future::poll_fn;

    const MISSING_PORT: &str = "/dev/pinserial-test-missing";

    fn next_event(conn: &mut LinuxConnection) -> Option<DriverEvent<serialport::Error>> {
        block_on(poll_fn(|cx| conn.poll_event(cx)))
    }

    #[test]
    fn test_missing_device_reports_open_failure() {
        let mut driver = LinuxSerial::new();
        let mut conn = driver.open_connection(MISSING_PORT, &OpenOptions::shared(UartConfig::default()));
        assert_eq!(conn.port(), MISSING_PORT);

        match next_event(&mut conn) {
            Some(DriverEvent::Opened(Err(_))) => {}
            other => panic!("expected open failure, got {other:?}"),
        }
    }

    #[test]
    fn test_requests_after_failed_open_still_complete() {
        let mut driver = LinuxSerial::new();
        let mut conn = driver.open_connection(MISSING_PORT, &OpenOptions::shared(UartConfig::default()));
        assert!(matches!(next_event(&mut conn), Some(DriverEvent::Opened(Err(_)))));

        conn.write(b"AT\r\n");
        conn.flush();
        conn.close();

        assert!(matches!(next_event(&mut conn), Some(DriverEvent::Written(Err(_)))));
        assert!(matches!(next_event(&mut conn), Some(DriverEvent::Flushed(Err(_)))));
        assert!(matches!(next_event(&mut conn), Some(DriverEvent::Closed(Ok(())))));
    }

    #[test]
    fn test_disconnected_error_kind() {
        assert_eq!(LinuxSerial::new().disconnected().kind(), ErrorKind::NoDevice);
    }

    #[test]
    fn test_unsupported_parity_fails_open() {
        let mut driver = LinuxSerial::new();
        let config = UartConfig {
            parity: pinserial_hal::Parity::Space,
            ..UartConfig::default()
        };
        let mut conn = driver.open_connection(MISSING_PORT, &OpenOptions::shared(config));

        match next_event(&mut conn) {
            Some(DriverEvent::Opened(Err(e))) => assert_eq!(e.kind(), ErrorKind::InvalidInput),
            other => panic!("expected open failure, got {other:?}"),
        }
    }
}
