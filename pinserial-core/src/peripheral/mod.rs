//! Peripheral base
//!
//! Common bookkeeping for anything that occupies header pins: the pin
//! claims themselves, the alive/destroyed flag guarding every public
//! operation, and event emission to listeners.

pub mod events;
pub mod pins;

use std::cell::Cell;
use std::rc::Rc;

use log::debug;

pub use events::{EventEmitter, ListenerId};
pub use pins::{PeripheralId, PinError, PinId, PinRegistry};

use crate::error::PeripheralError;

/// A claimed hardware resource with an explicit lifecycle
pub trait Peripheral {
    /// Identity within the board
    fn id(&self) -> PeripheralId;

    /// Pins held by this peripheral
    fn pins(&self) -> &[PinId];

    /// Check if the peripheral has not been destroyed yet
    fn is_alive(&self) -> bool;

    /// Tear the peripheral down and release its pins
    ///
    /// Calling this more than once has no further effect.
    fn destroy(&self);
}

/// State shared by every peripheral implementation
#[derive(Debug)]
pub struct PeripheralBase<E> {
    id: PeripheralId,
    pins: Vec<PinId>,
    registry: Rc<PinRegistry>,
    alive: Cell<bool>,
    events: EventEmitter<E>,
}

impl<E> PeripheralBase<E> {
    /// Claim `pins` and create the base
    pub fn new(registry: Rc<PinRegistry>, pins: &[PinId]) -> Result<Self, PinError> {
        let id = registry.allocate_id();
        registry.claim(id, pins)?;
        Ok(Self {
            id,
            pins: pins.to_vec(),
            registry,
            alive: Cell::new(true),
            events: EventEmitter::new(),
        })
    }

    pub fn id(&self) -> PeripheralId {
        self.id
    }

    pub fn pins(&self) -> &[PinId] {
        &self.pins
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// Fail with [`PeripheralError::Destroyed`] once destroyed
    pub fn validate_alive(&self) -> Result<(), PeripheralError> {
        if self.alive.get() {
            Ok(())
        } else {
            Err(PeripheralError::Destroyed)
        }
    }

    /// Release pins and mark the peripheral dead
    pub fn destroy(&self) {
        if self.alive.replace(false) {
            self.registry.release(self.id, &self.pins);
            debug!("Peripheral {} destroyed", self.id);
        }
    }

    pub fn on(&self, listener: impl FnMut(&E) + 'static) -> ListenerId {
        self.events.on(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn emit(&self, event: &E) -> usize {
        self.events.emit(event)
    }
}

impl<E> Drop for PeripheralBase<E> {
    fn drop(&mut self) {
        // Pins of a peripheral dropped without destroy() go back to the registry
        self.destroy();
    }
}
