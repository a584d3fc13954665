//! Board context
//!
//! A [`Board`] stands for the header of one single-board computer. It owns
//! the pin registry shared by all peripherals created on it and the
//! shutdown registry that tears them down. Dropping the board (normally at
//! the end of `main`) destroys every peripheral that is still alive.

use std::rc::{Rc, Weak};

use crate::peripheral::{Peripheral, PinRegistry};
use crate::shutdown::ShutdownRegistry;

#[derive(Debug, Default)]
pub struct Board {
    pins: Rc<PinRegistry>,
    shutdown: ShutdownRegistry,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin registry shared by peripherals on this board
    pub fn pins(&self) -> &Rc<PinRegistry> {
        &self.pins
    }

    /// Have `peripheral` destroyed when the board shuts down
    pub fn register(&self, peripheral: Weak<dyn Peripheral>) {
        self.shutdown.register(peripheral);
    }

    /// Number of live peripherals awaiting shutdown
    pub fn live_peripherals(&self) -> usize {
        self.shutdown.live_count()
    }

    /// Destroy all live peripherals
    ///
    /// Returns the number destroyed. Safe to call repeatedly.
    pub fn shutdown(&self) -> usize {
        self.shutdown.shutdown()
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.shutdown();
    }
}
