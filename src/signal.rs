//! # Signal — ordered notification channel.
//!
//! [`Signal`] is a minimal publish/subscribe primitive: an ordered list of
//! handlers, connected and disconnected by identity, fired by invoking each
//! handler in registration order. Handlers may be one-shot
//! ([`Signal::connect_once`]); one-shot entries are evicted after a fire.
//!
//! Identity is the [`Rc`] of the underlying callable ([`Handler`]), so a
//! handler registered as one-shot can still be disconnected with the same
//! handle — the one-shot marker lives on the slot, never on a wrapper.
//!
//! Task completion is built on `Signal<Task>`, but the primitive is generic
//! and usable anywhere loosely-coupled notification is needed.
//!
//! ## Example
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use cotick::{handler, Signal};
//!
//! let mut sig: Signal<u32> = Signal::new();
//! let seen = Rc::new(Cell::new(0u32));
//!
//! let sink = seen.clone();
//! let h = handler(move |v: &u32| sink.set(sink.get() + *v));
//! sig.connect_once(h.clone());
//!
//! sig.emit(&7);
//! sig.emit(&7); // one-shot: second fire is a no-op
//! assert_eq!(seen.get(), 7);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

/// Shared callable handle; the unit of identity for [`Signal`] registration.
pub type Handler<T> = Rc<RefCell<dyn FnMut(&T)>>;

/// Wraps a closure into a [`Handler`] handle.
///
/// Keep a clone of the returned handle if you intend to disconnect later.
pub fn handler<T, F>(f: F) -> Handler<T>
where
    F: FnMut(&T) + 'static,
{
    Rc::new(RefCell::new(f))
}

/// One registered handler plus its one-shot marker.
struct Slot<T> {
    callback: Handler<T>,
    once: bool,
}

/// Ordered notification channel.
///
/// Firing with no registered handlers is a no-op.
pub struct Signal<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    /// Creates an empty signal.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Registers a handler; it stays connected until disconnected.
    pub fn connect(&mut self, callback: Handler<T>) {
        self.slots.push(Slot { callback, once: false });
    }

    /// Registers a handler that is evicted after the next fire.
    pub fn connect_once(&mut self, callback: Handler<T>) {
        self.slots.push(Slot { callback, once: true });
    }

    /// Removes every slot holding this callable.
    ///
    /// Matches by `Rc` identity, so it works for handlers registered with
    /// either [`connect`](Signal::connect) or [`connect_once`](Signal::connect_once).
    pub fn disconnect(&mut self, callback: &Handler<T>) {
        self.slots.retain(|s| !Rc::ptr_eq(&s.callback, callback));
    }

    /// Invokes all handlers in registration order, then evicts one-shot slots.
    pub fn emit(&mut self, arg: &T) {
        for slot in &self.slots {
            (slot.callback.borrow_mut())(arg);
        }
        self.slots.retain(|s| !s.once);
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
