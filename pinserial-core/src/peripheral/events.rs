//! Listener-based event emission

use std::cell::{Cell, RefCell};
use std::mem;

/// Handle returned by [`EventEmitter::on`], used to remove the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Box<dyn FnMut(&E)>;

/// Synchronous fan-out of events to registered listeners
///
/// Listeners run in registration order. A listener may add or remove
/// listeners while it runs; additions take effect from the next emit.
pub struct EventEmitter<E> {
    listeners: RefCell<Vec<(ListenerId, Listener<E>)>>,
    /// Removals requested while `listeners` is taken out for an emit
    removed: RefCell<Vec<ListenerId>>,
    emitting: Cell<bool>,
    next_id: Cell<u64>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventEmitter<E> {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            removed: RefCell::new(Vec::new()),
            emitting: Cell::new(false),
            next_id: Cell::new(0),
        }
    }

    /// Register a listener
    pub fn on(&self, listener: impl FnMut(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Box::new(listener)));
        id
    }

    /// Remove a listener
    ///
    /// Returns false if `id` was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        if listeners.len() != before {
            return true;
        }
        if self.emitting.get() && id.0 < self.next_id.get() {
            self.removed.borrow_mut().push(id);
            return true;
        }
        false
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Deliver `event` to every listener
    ///
    /// Returns how many listeners were invoked. Nested emits from inside a
    /// listener reach only listeners added during the outer emit.
    pub fn emit(&self, event: &E) -> usize {
        let mut active = mem::take(&mut *self.listeners.borrow_mut());
        let outer = !self.emitting.replace(true);
        let mut invoked = 0;

        for (id, listener) in active.iter_mut() {
            if self.removed.borrow().contains(id) {
                continue;
            }
            listener(event);
            invoked += 1;
        }

        if outer {
            self.emitting.set(false);
        }

        let removed = mem::take(&mut *self.removed.borrow_mut());
        let mut listeners = self.listeners.borrow_mut();
        let added = mem::take(&mut *listeners);
        active.extend(added);
        active.retain(|(id, _)| !removed.contains(id));
        *listeners = active;

        invoked
    }
}

impl<E> core::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_emit_in_registration_order() {
        let emitter = EventEmitter::<u8>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = seen.clone();
        emitter.on(move |e| s.borrow_mut().push(("a", *e)));
        let s = seen.clone();
        emitter.on(move |e| s.borrow_mut().push(("b", *e)));

        assert_eq!(emitter.emit(&7), 2);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_off_removes_listener() {
        let emitter = EventEmitter::<()>::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let id = emitter.on(move |_| c.set(c.get() + 1));

        emitter.emit(&());
        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.emit(&());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_listener_can_register_during_emit() {
        let emitter = Rc::new(EventEmitter::<()>::new());
        let count = Rc::new(Cell::new(0));

        let e = emitter.clone();
        let c = count.clone();
        emitter.on(move |_| {
            let c = c.clone();
            e.on(move |_| c.set(c.get() + 1));
        });

        // Listener added during the emit is not invoked by that emit
        emitter.emit(&());
        assert_eq!(count.get(), 0);
        assert_eq!(emitter.listener_count(), 2);

        emitter.emit(&());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_listener_can_remove_itself() {
        let emitter = Rc::new(EventEmitter::<()>::new());
        let slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let e = emitter.clone();
        let s = slot.clone();
        let id = emitter.on(move |_| {
            if let Some(id) = s.get() {
                e.off(id);
            }
        });
        slot.set(Some(id));

        assert_eq!(emitter.emit(&()), 1);
        assert_eq!(emitter.listener_count(), 0);
    }
}
