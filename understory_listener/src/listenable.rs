// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-process event targets.
//!
//! A [`Listenable`] owns its listener registry and may have a parent [`Listenable`].
//! [`Listenable::dispatch_event`] walks the parent chain in two phases:
//!
//! 1) capture listeners root → target,
//! 2) bubble listeners target → root,
//!
//! stopping once propagation is stopped. Listenables are cheap handles; clones refer to
//! the same target, and equality is identity.
//!
//! ```
//! use understory_listener::listenable::Listenable;
//! use understory_listener::listener::Callback;
//! use understory_listener::types::{Event, EventRecord, ListenOptions, Outcome};
//!
//! let panel: Listenable<Event> = Listenable::new();
//! let button: Listenable<Event> = Listenable::new();
//! button.set_parent(Some(&panel));
//!
//! panel.listen(
//!     "click",
//!     &Callback::new(|ev: &mut Event| {
//!         ev.stop_propagation();
//!         Outcome::PreventDefault
//!     }),
//!     ListenOptions::capture(),
//! );
//! button.listen("click", &Callback::new(|_| unreachable!()), ListenOptions::bubble());
//!
//! let mut ev = Event::new("click");
//! assert!(!button.dispatch_event(&mut ev));
//! assert!(ev.propagation_stopped());
//! ```

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use smallvec::SmallVec;

use crate::dispatcher;
use crate::error::{ListenError, usage};
use crate::listener::{Callback, ListenerKey, ListenerSource};
use crate::registry::ListenerRegistry;
use crate::types::{EventRecord, ListenOptions, Phase};

/// An in-process event target with its own listeners.
pub struct Listenable<E> {
    inner: Rc<ListenableInner<E>>,
}

struct ListenableInner<E> {
    registry: RefCell<ListenerRegistry<E>>,
    parent: RefCell<Option<Rc<Self>>>,
}

impl<E: EventRecord + 'static> Listenable<E> {
    /// Create a target with no listeners and no parent.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ListenableInner {
                registry: RefCell::new(ListenerRegistry::new()),
                parent: RefCell::new(None),
            }),
        }
    }

    /// Set or clear the parent used by [`Listenable::dispatch_event`].
    ///
    /// The parent is kept alive by its children; dropping an intermediate handle does not
    /// cut descendants off from their ancestors.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is `self` or one of its descendants.
    #[track_caller]
    pub fn set_parent(&self, parent: Option<&Self>) {
        if let Some(parent) = parent {
            assert!(
                !parent.chain().iter().any(|n| Rc::ptr_eq(n, &self.inner)),
                "listenable parent chain must not contain a cycle"
            );
        }
        *self.inner.parent.borrow_mut() = parent.map(|p| Rc::clone(&p.inner));
    }

    /// The current parent, if any.
    pub fn parent(&self) -> Option<Self> {
        self.inner.parent().map(|inner| Self { inner })
    }

    /// Register `callback` for `event_type`.
    ///
    /// Registering an identical tuple again returns the existing key.
    pub fn try_listen(
        &self,
        event_type: &str,
        callback: &Callback<E>,
        options: ListenOptions,
    ) -> Result<ListenerKey<E>, ListenError> {
        self.add(event_type, callback, options, false)
    }

    /// Like [`Listenable::try_listen`], panicking on usage errors.
    #[track_caller]
    pub fn listen(
        &self,
        event_type: &str,
        callback: &Callback<E>,
        options: ListenOptions,
    ) -> ListenerKey<E> {
        usage(self.try_listen(event_type, callback, options))
    }

    /// Register a listener that is removed before its first delivery.
    pub fn try_listen_once(
        &self,
        event_type: &str,
        callback: &Callback<E>,
        options: ListenOptions,
    ) -> Result<ListenerKey<E>, ListenError> {
        self.add(event_type, callback, options, true)
    }

    /// Like [`Listenable::try_listen_once`], panicking on usage errors.
    #[track_caller]
    pub fn listen_once(
        &self,
        event_type: &str,
        callback: &Callback<E>,
        options: ListenOptions,
    ) -> ListenerKey<E> {
        usage(self.try_listen_once(event_type, callback, options))
    }

    /// Remove the listener matching the identity tuple.
    pub fn unlisten(
        &self,
        event_type: &str,
        callback: &Callback<E>,
        options: ListenOptions,
    ) -> bool {
        self.get_listener(event_type, callback, options)
            .is_some_and(|key| self.inner.remove_by_key(&key))
    }

    /// Remove a listener by key.
    ///
    /// Returns `Ok(false)` if it was already removed, and [`ListenError::ForeignKey`] if it
    /// was registered on a different target.
    pub fn try_unlisten_by_key(&self, key: &ListenerKey<E>) -> Result<bool, ListenError> {
        if !key.is_owned_by(Rc::as_ptr(&self.inner)) {
            return Err(ListenError::ForeignKey);
        }
        Ok(!key.is_removed() && self.inner.remove_by_key(key))
    }

    /// Like [`Listenable::try_unlisten_by_key`], panicking on a foreign key.
    #[track_caller]
    pub fn unlisten_by_key(&self, key: &ListenerKey<E>) -> bool {
        usage(self.try_unlisten_by_key(key))
    }

    /// Look up the live listener matching the identity tuple.
    pub fn get_listener(
        &self,
        event_type: &str,
        callback: &Callback<E>,
        options: ListenOptions,
    ) -> Option<ListenerKey<E>> {
        self.inner
            .registry
            .borrow()
            .get_listener(event_type, callback, options.capture, options.scope)
    }

    /// Live listeners for `(event_type, capture)` in registration order.
    pub fn get_listeners(&self, event_type: &str, capture: bool) -> Vec<ListenerKey<E>> {
        self.inner
            .registry
            .borrow()
            .snapshot(event_type, Phase::from_capture(capture))
            .into_vec()
    }

    /// Whether any listener matches the optional type and phase filters.
    pub fn has_listener(&self, event_type: Option<&str>, capture: Option<bool>) -> bool {
        self.inner
            .registry
            .borrow()
            .has_listener(event_type, capture)
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Deliver `event` to this target's `(event_type, capture)` listeners only.
    pub fn fire_listeners(&self, event_type: &str, capture: bool, event: &mut E) -> bool {
        dispatcher::fire_listeners(
            &self.inner.registry,
            event_type,
            Phase::from_capture(capture),
            event,
        )
    }

    /// Dispatch `event` through this target and its parents.
    ///
    /// Returns `false` if any listener prevented the default.
    pub fn dispatch_event(&self, event: &mut E) -> bool {
        let event_type = String::from(event.event_type());
        let chain = self.chain();
        let steps = dispatcher::two_phase(&chain);
        let result = dispatcher::run(&steps, event, |step, ev| {
            dispatcher::fire_listeners(&step.node.registry, &event_type, step.phase, ev)
        });
        result && !event.default_prevented()
    }

    /// Remove every listener, or every listener of one type. Returns how many were removed.
    pub fn remove_all_listeners(&self, event_type: Option<&str>) -> usize {
        let removed = self.inner.registry.borrow_mut().remove_all(event_type);
        if !removed.is_empty() {
            log::trace!("removed {} listeners from listenable", removed.len());
        }
        removed.len()
    }

    /// Remove every listener and detach from the parent.
    pub fn dispose(&self) {
        self.remove_all_listeners(None);
        *self.inner.parent.borrow_mut() = None;
    }

    pub(crate) fn add(
        &self,
        event_type: &str,
        callback: &Callback<E>,
        options: ListenOptions,
        one_shot: bool,
    ) -> Result<ListenerKey<E>, ListenError> {
        if event_type.is_empty() {
            return Err(ListenError::EmptyEventType);
        }
        let owner = Rc::downgrade(&self.inner) as Weak<dyn ListenerSource<E>>;
        let (key, created) = self.inner.registry.borrow_mut().add(
            event_type,
            callback,
            one_shot,
            options.capture,
            options.scope,
            &owner,
        );
        if created {
            log::trace!(
                "listen `{event_type}` on listenable (capture: {}, one-shot: {one_shot})",
                options.capture
            );
        }
        Ok(key)
    }

    /// This target followed by its ancestors.
    fn chain(&self) -> SmallVec<[Rc<ListenableInner<E>>; 16]> {
        let mut out = SmallVec::new();
        let mut cur = Some(Rc::clone(&self.inner));
        while let Some(node) = cur {
            cur = node.parent();
            out.push(node);
        }
        out
    }
}

impl<E> ListenableInner<E> {
    fn parent(&self) -> Option<Rc<Self>> {
        self.parent.borrow().clone()
    }
}

impl<E> ListenerSource<E> for ListenableInner<E> {
    fn remove_by_key(&self, key: &ListenerKey<E>) -> bool {
        let removed = self.registry.borrow_mut().remove_by_key(key);
        if removed {
            log::trace!("unlisten `{}` on listenable", key.event_type());
        }
        removed
    }
}

impl<E: EventRecord + 'static> Default for Listenable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Listenable<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> PartialEq for Listenable<E> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E> Eq for Listenable<E> {}

impl<E> fmt::Debug for Listenable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listenable")
            .field("registry", &*self.inner.registry.borrow())
            .field("has_parent", &self.inner.parent().is_some())
            .finish_non_exhaustive()
    }
}
