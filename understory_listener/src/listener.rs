// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener records, callbacks, and the keys handed back to callers.
//!
//! A registration is identified by the tuple `(source, type, capture, callback, scope)`.
//! The source is implicit in which registry holds the listener; the remaining parts are
//! compared here. Callback identity is pointer identity of the shared handler, so the
//! same [`Callback`] (or a clone of it) must be passed to unregister.
//!
//! ## Removal
//!
//! Removal flips a tombstone bit on the listener before it is spliced out of its
//! registry. Dispatch iterates over snapshots, so a listener removed mid-dispatch may
//! still sit in a snapshot; the tombstone keeps it from being called.

use alloc::rc::{Rc, Weak};
use core::cell::Cell;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::types::{Outcome, Phase, Scope};

/// An object that can receive events.
///
/// Closures of the form `Fn(&mut E) -> Outcome` implement this automatically; implement
/// it by hand for listener objects that keep their own state.
pub trait HandleEvent<E> {
    /// Handle one delivery.
    fn handle_event(&self, event: &mut E) -> Outcome;
}

impl<E, F> HandleEvent<E> for F
where
    F: Fn(&mut E) -> Outcome,
{
    fn handle_event(&self, event: &mut E) -> Outcome {
        self(event)
    }
}

/// A shareable listener callback with pointer identity.
///
/// ```
/// use understory_listener::listener::Callback;
/// use understory_listener::types::{Event, Outcome};
///
/// let a: Callback<Event> = Callback::new(|_| Outcome::Continue);
/// let b = a.clone();
/// let c: Callback<Event> = Callback::new(|_| Outcome::Continue);
/// assert!(a.same(&b));
/// assert!(!a.same(&c));
/// ```
pub struct Callback<E>(Rc<dyn HandleEvent<E>>);

impl<E> Callback<E> {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut E) -> Outcome + 'static,
    {
        Self(Rc::new(f))
    }

    /// Share an existing handler object.
    ///
    /// Two callbacks built from clones of the same `Rc` are the same callback.
    pub fn from_rc<H>(handler: Rc<H>) -> Self
    where
        H: HandleEvent<E> + 'static,
    {
        Self(handler)
    }

    /// Whether both callbacks refer to the same handler.
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn call(&self, event: &mut E) -> Outcome {
        self.0.handle_event(event)
    }
}

impl<E> Clone for Callback<E> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<E> fmt::Debug for Callback<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

bitflags::bitflags! {
    /// Per-listener state bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ListenerFlags: u8 {
        /// Registered for the capture phase.
        const CAPTURE  = 0b0000_0001;
        /// Removed before its first delivery.
        const ONE_SHOT = 0b0000_0010;
        /// Tombstone: never deliver again.
        const REMOVED  = 0b0000_0100;
    }
}

/// Whatever owns the registry a listener lives in.
///
/// Native nodes and listenables both implement this so a key can be removed without the
/// caller naming its source.
pub(crate) trait ListenerSource<E> {
    /// Remove `key` from this source. Returns `false` if it was not registered here.
    fn remove_by_key(&self, key: &ListenerKey<E>) -> bool;
}

pub(crate) struct Listener<E> {
    event_type: Rc<str>,
    callback: Callback<E>,
    scope: Option<Scope>,
    flags: Cell<ListenerFlags>,
    owner: Weak<dyn ListenerSource<E>>,
}

/// Opaque handle to a registration.
///
/// Returned by every `listen` call and accepted by every `unlisten_by_key`. Keys compare
/// equal only when they refer to the same registration. A key keeps its listener record
/// alive but not the target it was registered on.
pub struct ListenerKey<E>(Rc<Listener<E>>);

impl<E> ListenerKey<E> {
    pub(crate) fn new(
        event_type: Rc<str>,
        callback: Callback<E>,
        flags: ListenerFlags,
        scope: Option<Scope>,
        owner: Weak<dyn ListenerSource<E>>,
    ) -> Self {
        Self(Rc::new(Listener {
            event_type,
            callback,
            scope,
            flags: Cell::new(flags),
            owner,
        }))
    }

    /// The event type this listener is registered for.
    pub fn event_type(&self) -> &str {
        &self.0.event_type
    }

    pub(crate) fn event_type_rc(&self) -> &Rc<str> {
        &self.0.event_type
    }

    /// Whether this is a capture-phase listener.
    pub fn is_capture(&self) -> bool {
        self.flags().contains(ListenerFlags::CAPTURE)
    }

    /// The phase this listener is delivered in.
    pub fn phase(&self) -> Phase {
        Phase::from_capture(self.is_capture())
    }

    /// Whether the listener unregisters itself on first delivery.
    pub fn is_one_shot(&self) -> bool {
        self.flags().contains(ListenerFlags::ONE_SHOT)
    }

    /// Whether the listener has been removed.
    pub fn is_removed(&self) -> bool {
        self.flags().contains(ListenerFlags::REMOVED)
    }

    /// The bound scope, if any.
    pub fn scope(&self) -> Option<Scope> {
        self.0.scope
    }

    /// The registered callback.
    pub fn callback(&self) -> &Callback<E> {
        &self.0.callback
    }

    /// Current state bits.
    pub fn flags(&self) -> ListenerFlags {
        self.0.flags.get()
    }

    /// Remove this registration from whatever target holds it.
    ///
    /// Returns `false` if it was already removed; removing twice is not an error.
    pub fn unlisten(&self) -> bool {
        if self.is_removed() {
            return false;
        }
        match self.0.owner.upgrade() {
            Some(owner) => owner.remove_by_key(self),
            None => {
                // The target went away without tearing down; nothing left to detach from.
                self.mark_removed();
                false
            }
        }
    }

    pub(crate) fn matches(
        &self,
        callback: &Callback<E>,
        capture: bool,
        scope: Option<Scope>,
    ) -> bool {
        self.is_capture() == capture && self.0.scope == scope && self.0.callback.same(callback)
    }

    pub(crate) fn is_owned_by<T: ?Sized>(&self, owner: *const T) -> bool {
        core::ptr::addr_eq(self.0.owner.as_ptr(), owner)
    }

    pub(crate) fn mark_removed(&self) {
        self.0.flags.set(self.flags() | ListenerFlags::REMOVED);
    }

    pub(crate) fn make_persistent(&self) {
        self.0.flags.set(self.flags() - ListenerFlags::ONE_SHOT);
    }
}

impl<E> Clone for ListenerKey<E> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<E> PartialEq for ListenerKey<E> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> Eq for ListenerKey<E> {}

impl<E> Hash for ListenerKey<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::ptr::hash(Rc::as_ptr(&self.0), state);
    }
}

impl<E> fmt::Debug for ListenerKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerKey")
            .field("event_type", &self.event_type())
            .field("flags", &self.flags())
            .field("scope", &self.0.scope)
            .field("callback", &self.0.callback)
            .finish_non_exhaustive()
    }
}

/// Remove a registration by key, wherever it lives.
///
/// Equivalent to [`ListenerKey::unlisten`].
pub fn unlisten_by_key<E>(key: &ListenerKey<E>) -> bool {
    key.unlisten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;
    use core::cell::RefCell;

    struct Counter {
        hits: Cell<u32>,
    }

    impl HandleEvent<Event> for Counter {
        fn handle_event(&self, _event: &mut Event) -> Outcome {
            self.hits.set(self.hits.get() + 1);
            Outcome::Continue
        }
    }

    struct Sink {
        removed: RefCell<alloc::vec::Vec<bool>>,
    }

    impl ListenerSource<Event> for Sink {
        fn remove_by_key(&self, key: &ListenerKey<Event>) -> bool {
            key.mark_removed();
            self.removed.borrow_mut().push(true);
            true
        }
    }

    fn key_on(
        owner: &Rc<Sink>,
        callback: Callback<Event>,
        flags: ListenerFlags,
    ) -> ListenerKey<Event> {
        let owner = Rc::downgrade(owner) as Weak<dyn ListenerSource<Event>>;
        ListenerKey::new(Rc::from("action"), callback, flags, None, owner)
    }

    #[test]
    fn handler_objects_share_identity_through_rc() {
        let counter = Rc::new(Counter { hits: Cell::new(0) });
        let a = Callback::from_rc(counter.clone());
        let b = Callback::from_rc(counter.clone());
        assert!(a.same(&b));

        a.call(&mut Event::new("action"));
        b.call(&mut Event::new("action"));
        assert_eq!(counter.hits.get(), 2);
    }

    #[test]
    fn unlisten_goes_through_owner_once() {
        let sink = Rc::new(Sink {
            removed: RefCell::new(alloc::vec::Vec::new()),
        });
        let key = key_on(&sink, Callback::new(|_| Outcome::Continue), ListenerFlags::empty());
        assert!(key.unlisten());
        assert!(key.is_removed());
        assert!(!key.unlisten());
        assert_eq!(sink.removed.borrow().len(), 1);
    }

    #[test]
    fn unlisten_after_owner_dropped_is_a_no_op() {
        let sink = Rc::new(Sink {
            removed: RefCell::new(alloc::vec::Vec::new()),
        });
        let key = key_on(&sink, Callback::new(|_| Outcome::Continue), ListenerFlags::empty());
        drop(sink);
        assert!(!key.unlisten());
        assert!(key.is_removed());
    }

    #[test]
    fn matches_compares_capture_scope_and_callback() {
        let sink = Rc::new(Sink {
            removed: RefCell::new(alloc::vec::Vec::new()),
        });
        let cb = Callback::new(|_: &mut Event| Outcome::Continue);
        let key = key_on(&sink, cb.clone(), ListenerFlags::CAPTURE);
        assert!(key.matches(&cb, true, None));
        assert!(!key.matches(&cb, false, None));
        assert!(!key.matches(&cb, true, Some(Scope::new(1))));
        assert!(!key.matches(&Callback::new(|_| Outcome::Continue), true, None));
    }

    #[test]
    fn make_persistent_clears_one_shot_only() {
        let sink = Rc::new(Sink {
            removed: RefCell::new(alloc::vec::Vec::new()),
        });
        let key = key_on(
            &sink,
            Callback::new(|_| Outcome::Continue),
            ListenerFlags::ONE_SHOT | ListenerFlags::CAPTURE,
        );
        key.make_persistent();
        assert_eq!(key.flags(), ListenerFlags::CAPTURE);
    }
}
