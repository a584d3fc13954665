//! Pin claim registry
//!
//! Tracks which peripheral currently holds each header pin. Pins are
//! identified by their header function name (e.g. `TXD0`), not by GPIO
//! number.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;

use log::trace;

/// Header pin identifier
pub type PinId = &'static str;

/// Identity of a peripheral within a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralId(u32);

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error when claiming pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin is held by another peripheral
    #[error("pin {pin} is already claimed by peripheral {owner}")]
    AlreadyClaimed { pin: PinId, owner: PeripheralId },
}

/// Registry of claimed pins
///
/// Shared by every peripheral created from the same board.
#[derive(Debug, Default)]
pub struct PinRegistry {
    claims: RefCell<BTreeMap<PinId, PeripheralId>>,
    next_id: Cell<u32>,
}

impl PinRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh peripheral id
    pub fn allocate_id(&self) -> PeripheralId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        PeripheralId(id)
    }

    /// Claim `pins` for `owner`
    ///
    /// Either every pin is claimed or none is. Pins already held by
    /// `owner` are accepted.
    pub fn claim(&self, owner: PeripheralId, pins: &[PinId]) -> Result<(), PinError> {
        let mut claims = self.claims.borrow_mut();

        for &pin in pins {
            if let Some(&holder) = claims.get(pin) {
                if holder != owner {
                    return Err(PinError::AlreadyClaimed { pin, owner: holder });
                }
            }
        }

        for &pin in pins {
            claims.insert(pin, owner);
        }
        trace!("Peripheral {} claimed {:?}", owner, pins);
        Ok(())
    }

    /// Release `pins` held by `owner`
    ///
    /// Pins held by someone else are left alone.
    pub fn release(&self, owner: PeripheralId, pins: &[PinId]) {
        let mut claims = self.claims.borrow_mut();
        for pin in pins {
            if claims.get(pin) == Some(&owner) {
                claims.remove(pin);
            }
        }
        trace!("Peripheral {} released {:?}", owner, pins);
    }

    /// Current holder of `pin`
    pub fn owner(&self, pin: &str) -> Option<PeripheralId> {
        self.claims.borrow().get(pin).copied()
    }

    /// Check if a pin is free
    pub fn is_available(&self, pin: &str) -> bool {
        self.owner(pin).is_none()
    }

    /// Number of pins currently claimed
    pub fn claimed_count(&self) -> usize {
        self.claims.borrow().len()
    }
}
