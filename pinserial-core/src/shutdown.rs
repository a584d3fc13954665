//! Shutdown-time teardown of live peripherals
//!
//! Each peripheral registers a weak reference here when it is created.
//! Shutdown visits every registered peripheral once and destroys the ones
//! still alive, so devices get closed and pins released before the host
//! process ends.

use std::cell::RefCell;
use std::rc::Weak;

use log::debug;

use crate::peripheral::Peripheral;

/// Registry of peripherals to destroy at shutdown
#[derive(Default)]
pub struct ShutdownRegistry {
    entries: RefCell<Vec<Weak<dyn Peripheral>>>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peripheral
    pub fn register(&self, peripheral: Weak<dyn Peripheral>) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|entry| entry.strong_count() > 0);
        entries.push(peripheral);
    }

    /// Number of registered peripherals that still exist
    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|p| p.is_alive())
            .count()
    }

    /// Destroy every registered peripheral that is still alive
    ///
    /// Entries are consumed, so a peripheral is visited at most once.
    /// Returns the number of peripherals destroyed.
    pub fn shutdown(&self) -> usize {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        let mut destroyed = 0;

        for peripheral in entries.iter().filter_map(Weak::upgrade) {
            if peripheral.is_alive() {
                peripheral.destroy();
                destroyed += 1;
            }
        }

        if destroyed > 0 {
            debug!("Shutdown destroyed {} peripherals", destroyed);
        }
        destroyed
    }
}

impl core::fmt::Debug for ShutdownRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShutdownRegistry")
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::{PeripheralId, PinId, PinRegistry};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Dummy {
        id: PeripheralId,
        alive: Cell<bool>,
        destroyed: Cell<u32>,
    }

    impl Dummy {
        fn new(registry: &PinRegistry) -> Rc<Self> {
            Rc::new(Self {
                id: registry.allocate_id(),
                alive: Cell::new(true),
                destroyed: Cell::new(0),
            })
        }
    }

    impl Peripheral for Dummy {
        fn id(&self) -> PeripheralId {
            self.id
        }

        fn pins(&self) -> &[PinId] {
            &[]
        }

        fn is_alive(&self) -> bool {
            self.alive.get()
        }

        fn destroy(&self) {
            self.alive.set(false);
            self.destroyed.set(self.destroyed.get() + 1);
        }
    }

    fn weak(p: &Rc<Dummy>) -> Weak<dyn Peripheral> {
        let weak: Weak<Dummy> = Rc::downgrade(p);
        weak
    }

    #[test]
    fn test_shutdown_destroys_once() {
        let pins = PinRegistry::new();
        let registry = ShutdownRegistry::new();
        let a = Dummy::new(&pins);
        let b = Dummy::new(&pins);
        registry.register(weak(&a));
        registry.register(weak(&b));
        assert_eq!(registry.live_count(), 2);

        assert_eq!(registry.shutdown(), 2);
        assert_eq!(registry.shutdown(), 0);
        assert_eq!(a.destroyed.get(), 1);
        assert_eq!(b.destroyed.get(), 1);
    }

    #[test]
    fn test_shutdown_skips_dead_and_dropped() {
        let pins = PinRegistry::new();
        let registry = ShutdownRegistry::new();
        let already_dead = Dummy::new(&pins);
        already_dead.destroy();
        registry.register(weak(&already_dead));
        {
            let dropped = Dummy::new(&pins);
            registry.register(weak(&dropped));
        }

        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.shutdown(), 0);
        assert_eq!(already_dead.destroyed.get(), 1);
    }
}
