//! Deferred operation results
//!
//! Every asynchronous peripheral operation hands back a [`Completion`].
//! The caller can `.await` it, check it with [`Completion::try_take`], or
//! attach a callback with [`Completion::then`]. Dropping it is fine; the
//! operation still runs.
//!
//! Results are delivered by the peripheral's dispatch loop, never inside
//! the call that started the operation.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use embassy_sync::waitqueue::WakerRegistration;

struct Slot<T> {
    value: Option<T>,
    callback: Option<Box<dyn FnOnce(T)>>,
    resolved: bool,
    waker: WakerRegistration,
}

/// Create a connected responder/completion pair
pub(crate) fn pair<T>() -> (Responder<T>, Completion<T>) {
    let slot = Rc::new(RefCell::new(Slot {
        value: None,
        callback: None,
        resolved: false,
        waker: WakerRegistration::new(),
    }));
    (Responder { slot: slot.clone() }, Completion { slot })
}

/// Producer side, held by the peripheral until the outcome is known
pub(crate) struct Responder<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Responder<T> {
    /// Deliver the outcome
    ///
    /// Runs the attached callback, if any, after the slot borrow is released.
    pub(crate) fn resolve(self, value: T) {
        let callback = {
            let mut slot = self.slot.borrow_mut();
            slot.resolved = true;
            slot.callback.take()
        };

        match callback {
            Some(callback) => callback(value),
            None => {
                let mut slot = self.slot.borrow_mut();
                slot.value = Some(value);
                slot.waker.wake();
            }
        }
    }
}

/// Outcome of an operation that finishes later
#[must_use = "a completion can be ignored, but its result is then lost"]
pub struct Completion<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Completion<T> {
    /// Check if the outcome has been delivered
    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().resolved
    }

    /// Take the outcome if it has arrived
    pub fn try_take(&mut self) -> Option<T> {
        self.slot.borrow_mut().value.take()
    }

    /// Run `callback` with the outcome
    ///
    /// If the outcome is already here the callback runs immediately,
    /// otherwise it runs inside the dispatch that delivers it.
    pub fn then(self, callback: impl FnOnce(T) + 'static)
    where
        T: 'static,
    {
        let value = {
            let mut slot = self.slot.borrow_mut();
            match slot.value.take() {
                Some(value) => value,
                None => {
                    // A resolved slot without a value was already taken
                    if !slot.resolved {
                        slot.callback = Some(Box::new(callback));
                    }
                    return;
                }
            }
        };
        callback(value);
    }

    /// Discard the outcome
    pub fn ignore(self) {}
}

impl<T> Future for Completion<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut slot = self.slot.borrow_mut();
        match slot.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                slot.waker.register(cx.waker());
                Poll::Pending
            }
        }
    }
}

impl<T> core::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Completion")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_await_after_resolve() {
        let (responder, completion) = pair::<u8>();
        assert!(!completion.is_resolved());
        responder.resolve(3);
        assert!(completion.is_resolved());
        assert_eq!(embassy_futures::block_on(completion), 3);
    }

    #[test]
    fn test_try_take() {
        let (responder, mut completion) = pair::<&str>();
        assert_eq!(completion.try_take(), None);
        responder.resolve("done");
        assert_eq!(completion.try_take(), Some("done"));
        assert_eq!(completion.try_take(), None);
    }

    #[test]
    fn test_callback_runs_on_resolve() {
        let (responder, completion) = pair::<u32>();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        completion.then(move |v| s.set(v));

        assert_eq!(seen.get(), 0);
        responder.resolve(42);
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn test_callback_attached_after_resolve_runs_immediately() {
        let (responder, completion) = pair::<u32>();
        responder.resolve(7);

        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        completion.then(move |v| s.set(v));
        assert_eq!(seen.get(), 7);
    }
}
