// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The event system: listener registration and dispatch for both target kinds.
//!
//! ## Overview
//!
//! [`EventSystem`] owns a native source and a side-table from native node to that node's
//! listener registry and adapters. Nothing is stored on the platform's nodes.
//! [`Listenable`] targets own their registry themselves; the system forwards to them.
//!
//! Every entry point takes a [`Target`] and branches once on its kind.
//!
//! ## Lifetimes
//!
//! - A node's entry is created on its first registration and dropped when its last
//!   listener is removed.
//! - An adapter is created on the first listener for a `(node, type, capture)` triple and
//!   unsubscribed when the last one is removed.
//! - [`EventSystem::remove_all`] tears a node down in one step.
//! - Dropping the last handle to a system unsubscribes everything it still holds.
//!
//! Handles are cheap to clone. Callbacks that need to re-enter the system capture a
//! clone; note this forms a reference cycle that keeps the system alive until the
//! listener is removed.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use hashbrown::HashMap;

use crate::adapter::{AdapterSlots, Delivery, NativeAdapter};
use crate::config::{CapturePolicy, Config};
use crate::dispatcher;
use crate::error::{ListenError, usage};
use crate::listenable::Listenable;
use crate::listener::{Callback, ListenerKey, ListenerSource};
use crate::native::{Capabilities, NativeSource};
use crate::registry::ListenerRegistry;
use crate::types::{ListenOptions, Phase};

/// Where listeners are registered and events delivered.
pub enum Target<'a, N, E> {
    /// A node of the system's native source.
    Native(N),
    /// An in-process target that manages its own listeners.
    Listenable(&'a Listenable<E>),
}

impl<N: Copy, E> Clone for Target<'_, N, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N: Copy, E> Copy for Target<'_, N, E> {}

impl<'a, N, E> From<&'a Listenable<E>> for Target<'a, N, E> {
    fn from(listenable: &'a Listenable<E>) -> Self {
        Self::Listenable(listenable)
    }
}

impl<N: fmt::Debug, E> fmt::Debug for Target<'_, N, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(node) => f.debug_tuple("Native").field(node).finish(),
            Self::Listenable(l) => f.debug_tuple("Listenable").field(l).finish(),
        }
    }
}

/// Listener registration and dispatch over a native source and any number of listenables.
///
/// See the [module docs](self) for lifetimes and reentrancy.
pub struct EventSystem<S: NativeSource + 'static> {
    core: Rc<Core<S>>,
}

pub(crate) struct Core<S: NativeSource + 'static> {
    pub(crate) source: S,
    pub(crate) config: Config,
    pub(crate) delivery: Delivery,
    table: RefCell<HashMap<S::Node, Rc<NativeEntry<S>>>>,
}

/// Side-table entry for one native node.
pub(crate) struct NativeEntry<S: NativeSource + 'static> {
    node: S::Node,
    core: Weak<Core<S>>,
    registry: RefCell<ListenerRegistry<S::Event>>,
    adapters: RefCell<HashMap<Rc<str>, AdapterSlots<S>>>,
}

impl<S: NativeSource + 'static> EventSystem<S> {
    /// Create a system over `source` with the default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, Config::default())
    }

    /// Create a system over `source` with an explicit configuration.
    pub fn with_config(source: S, config: Config) -> Self {
        let caps = source.capabilities();
        let delivery = if !caps.contains(Capabilities::NATIVE_CAPTURE)
            && caps.contains(Capabilities::ANCESTRY)
            && config.capture_policy == CapturePolicy::Emulate
        {
            Delivery::Emulated
        } else {
            Delivery::Native
        };
        log::debug!("event system created with {delivery:?} delivery ({caps:?})");
        Self {
            core: Rc::new(Core {
                source,
                config,
                delivery,
                table: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The configuration this system was created with.
    pub fn config(&self) -> &Config {
        &self.core.config
    }

    /// The native source.
    pub fn source(&self) -> &S {
        &self.core.source
    }

    /// Whether capture listeners on native nodes are delivered by emulation.
    pub fn emulates_capture(&self) -> bool {
        self.core.delivery == Delivery::Emulated
    }

    /// Register `callback` for `event_type` on `target`.
    ///
    /// Registering an identical `(target, type, capture, callback, scope)` tuple again
    /// returns the existing key. A one-shot registration of the same tuple becomes
    /// persistent.
    pub fn try_listen<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> Result<ListenerKey<S::Event>, ListenError> {
        self.add(target.into(), event_type, callback, options, false)
    }

    /// Like [`EventSystem::try_listen`], panicking on usage errors.
    #[track_caller]
    pub fn listen<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> ListenerKey<S::Event> {
        usage(self.try_listen(target, event_type, callback, options))
    }

    /// Register a listener that removes itself before its first delivery.
    ///
    /// If the tuple is already registered as persistent it stays persistent.
    pub fn try_listen_once<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> Result<ListenerKey<S::Event>, ListenError> {
        self.add(target.into(), event_type, callback, options, true)
    }

    /// Like [`EventSystem::try_listen_once`], panicking on usage errors.
    #[track_caller]
    pub fn listen_once<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> ListenerKey<S::Event> {
        usage(self.try_listen_once(target, event_type, callback, options))
    }

    /// Remove the listener matching the identity tuple. Returns whether one was removed.
    pub fn unlisten<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> bool {
        self.get_listener(target, event_type, callback, options)
            .is_some_and(|key| key.unlisten())
    }

    /// Remove a listener by key. Returns `false` if it was already removed.
    pub fn unlisten_by_key(&self, key: &ListenerKey<S::Event>) -> bool {
        key.unlisten()
    }

    /// Look up the live listener matching the identity tuple.
    pub fn get_listener<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> Option<ListenerKey<S::Event>> {
        match target.into() {
            Target::Native(node) => self.core.entry(node)?.registry.borrow().get_listener(
                event_type,
                callback,
                options.capture,
                options.scope,
            ),
            Target::Listenable(l) => l.get_listener(event_type, callback, options),
        }
    }

    /// Live listeners for `(event_type, capture)` in registration order.
    pub fn get_listeners<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        capture: bool,
    ) -> Vec<ListenerKey<S::Event>> {
        match target.into() {
            Target::Native(node) => self
                .core
                .entry(node)
                .map(|e| {
                    e.registry
                        .borrow()
                        .snapshot(event_type, Phase::from_capture(capture))
                        .into_vec()
                })
                .unwrap_or_default(),
            Target::Listenable(l) => l.get_listeners(event_type, capture),
        }
    }

    /// Whether `target` has any listener, optionally narrowed by type and phase.
    pub fn has_listener<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: Option<&str>,
        capture: Option<bool>,
    ) -> bool {
        match target.into() {
            Target::Native(node) => self
                .core
                .entry(node)
                .is_some_and(|e| e.registry.borrow().has_listener(event_type, capture)),
            Target::Listenable(l) => l.has_listener(event_type, capture),
        }
    }

    /// Remove every listener on `target`, or every listener of one type.
    ///
    /// For a native node this also unsubscribes the affected adapters and, when nothing
    /// remains, drops the node's entry. Returns the number of listeners removed.
    pub fn remove_all<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: Option<&str>,
    ) -> usize {
        match target.into() {
            Target::Native(node) => self.core.remove_all(node, event_type),
            Target::Listenable(l) => l.remove_all_listeners(event_type),
        }
    }

    /// Deliver `event` to the `(event_type, capture)` listeners of `target` only.
    ///
    /// Returns `false` if any listener prevented the default.
    pub fn fire_listeners<'a>(
        &self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        capture: bool,
        event: &mut S::Event,
    ) -> bool {
        match target.into() {
            Target::Native(node) => {
                self.core
                    .fire_node(node, event_type, Phase::from_capture(capture), event)
            }
            Target::Listenable(l) => l.fire_listeners(event_type, capture, event),
        }
    }

    /// Dispatch `event` on a listenable and its parent chain.
    ///
    /// See [`Listenable::dispatch_event`].
    pub fn dispatch_event(&self, target: &Listenable<S::Event>, event: &mut S::Event) -> bool {
        target.dispatch_event(event)
    }

    /// Total live listeners on native nodes.
    pub fn listener_count(&self) -> usize {
        self.core
            .table
            .borrow()
            .values()
            .map(|e| e.registry.borrow().len())
            .sum()
    }

    /// Number of live physical subscriptions held on the native source.
    pub fn adapter_count(&self) -> usize {
        self.core
            .table
            .borrow()
            .values()
            .map(|e| e.adapters.borrow().values().map(AdapterSlots::len).sum::<usize>())
            .sum()
    }

    fn add(
        &self,
        target: Target<'_, S::Node, S::Event>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
        one_shot: bool,
    ) -> Result<ListenerKey<S::Event>, ListenError> {
        let node = match target {
            Target::Listenable(l) => return l.add(event_type, callback, options, one_shot),
            Target::Native(node) => node,
        };
        if event_type.is_empty() {
            return Err(ListenError::EmptyEventType);
        }
        let subscribe = if options.capture {
            self.core.capture_supported()?
        } else {
            true
        };

        let entry = self.core.entry_or_insert(&self.core, node);
        let owner = Rc::downgrade(&entry) as Weak<dyn ListenerSource<S::Event>>;
        let (key, created) = entry.registry.borrow_mut().add(
            event_type,
            callback,
            one_shot,
            options.capture,
            options.scope,
            &owner,
        );
        if created {
            log::trace!(
                "listen `{event_type}` on {node:?} (capture: {}, one-shot: {one_shot})",
                options.capture
            );
            if subscribe {
                entry.retain_adapter(&self.core, key.event_type_rc(), options.capture);
            } else {
                log::warn!("capture listener `{event_type}` on {node:?} will never fire");
            }
        }
        Ok(key)
    }
}

impl<S: NativeSource + 'static> Clone for EventSystem<S> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<S: NativeSource + 'static> fmt::Debug for EventSystem<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSystem")
            .field("config", &self.core.config)
            .field("delivery", &self.core.delivery)
            .field("nodes", &self.core.table.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<S: NativeSource + 'static> Core<S> {
    fn entry(&self, node: S::Node) -> Option<Rc<NativeEntry<S>>> {
        self.table.borrow().get(&node).cloned()
    }

    fn entry_or_insert(&self, this: &Rc<Self>, node: S::Node) -> Rc<NativeEntry<S>> {
        let mut table = self.table.borrow_mut();
        Rc::clone(table.entry(node).or_insert_with(|| {
            Rc::new(NativeEntry {
                node,
                core: Rc::downgrade(this),
                registry: RefCell::new(ListenerRegistry::new()),
                adapters: RefCell::new(HashMap::new()),
            })
        }))
    }

    /// Whether a capture listener should get a physical subscription.
    ///
    /// `Ok(false)` means the listener is accepted but will never be delivered.
    fn capture_supported(&self) -> Result<bool, ListenError> {
        if self.delivery == Delivery::Emulated
            || self
                .source
                .capabilities()
                .contains(Capabilities::NATIVE_CAPTURE)
        {
            return Ok(true);
        }
        match self.config.capture_policy {
            CapturePolicy::Silent => Ok(false),
            CapturePolicy::Emulate | CapturePolicy::Fail => Err(ListenError::CaptureUnsupported),
        }
    }

    /// Fire one node's `(type, phase)` bucket.
    pub(crate) fn fire_node(
        &self,
        node: S::Node,
        event_type: &str,
        phase: Phase,
        event: &mut S::Event,
    ) -> bool {
        match self.entry(node) {
            Some(entry) => dispatcher::fire_listeners(&entry.registry, event_type, phase, event),
            None => true,
        }
    }

    fn remove_all(&self, node: S::Node, event_type: Option<&str>) -> usize {
        let Some(entry) = self.entry(node) else {
            return 0;
        };
        let removed = entry.teardown(&self.source, event_type);
        if entry.registry.borrow().is_empty() {
            self.detach(node, &entry);
        }
        log::trace!("removed {removed} listeners from {node:?}");
        removed
    }

    /// Drop `node`'s entry if it is still `entry`.
    fn detach(&self, node: S::Node, entry: &NativeEntry<S>) {
        let removed = {
            let mut table = self.table.borrow_mut();
            if table
                .get(&node)
                .is_some_and(|e| core::ptr::eq(Rc::as_ptr(e), entry))
            {
                table.remove(&node)
            } else {
                None
            }
        };
        // Dropped outside the borrow: listener callbacks may own values whose drop re-enters.
        drop(removed);
    }
}

impl<S: NativeSource + 'static> Drop for Core<S> {
    fn drop(&mut self) {
        let entries: Vec<_> = self.table.get_mut().drain().map(|(_, e)| e).collect();
        for entry in entries {
            entry.teardown(&self.source, None);
        }
    }
}

impl<S: NativeSource + 'static> NativeEntry<S> {
    fn retain_adapter(&self, core: &Rc<Core<S>>, event_type: &Rc<str>, capture: bool) {
        if let Some(adapter) = self
            .adapters
            .borrow_mut()
            .get_mut(&**event_type)
            .and_then(|slots| slots.get_mut(capture))
        {
            adapter.retain();
            return;
        }
        let adapter = NativeAdapter::attach(core, self.node, event_type, capture);
        self.adapters
            .borrow_mut()
            .entry(Rc::clone(event_type))
            .or_default()
            .put(capture, adapter);
    }

    /// Release one listener's hold on its adapter, returning the adapter if it is done.
    fn release_adapter(&self, event_type: &str, capture: bool) -> Option<NativeAdapter<S>> {
        let mut adapters = self.adapters.borrow_mut();
        let slots = adapters.get_mut(event_type)?;
        if !slots.get_mut(capture)?.release() {
            return None;
        }
        let adapter = slots.take(capture);
        if slots.is_empty() {
            adapters.remove(event_type);
        }
        adapter
    }

    /// Remove listeners (all, or one type) and unsubscribe their adapters in bulk.
    fn teardown(&self, source: &S, event_type: Option<&str>) -> usize {
        let removed = self.registry.borrow_mut().remove_all(event_type);
        let adapters: Vec<NativeAdapter<S>> = {
            let mut adapters = self.adapters.borrow_mut();
            match event_type {
                Some(ty) => adapters
                    .remove(ty)
                    .map(|slots| slots.into_adapters().collect())
                    .unwrap_or_default(),
                None => adapters
                    .drain()
                    .flat_map(|(_, slots)| slots.into_adapters())
                    .collect(),
            }
        };
        if !adapters.is_empty() {
            log::debug!("detaching {} adapters from {:?}", adapters.len(), self.node);
        }
        for adapter in adapters {
            adapter.detach(source);
        }
        removed.len()
    }
}

impl<S: NativeSource + 'static> ListenerSource<S::Event> for NativeEntry<S> {
    fn remove_by_key(&self, key: &ListenerKey<S::Event>) -> bool {
        if !self.registry.borrow_mut().remove_by_key(key) {
            return false;
        }
        log::trace!("unlisten `{}` on {:?}", key.event_type(), self.node);
        let core = self.core.upgrade();
        let done = self.release_adapter(key.event_type(), key.is_capture());
        if let Some(core) = &core {
            if let Some(adapter) = done {
                log::debug!("detaching adapter for `{}` on {:?}", key.event_type(), self.node);
                adapter.detach(&core.source);
            }
            if self.registry.borrow().is_empty() {
                core.detach(self.node, self);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tree::{NodeId, TreeSource};
    use crate::types::{Event, EventRecord, Outcome, Scope};
    use alloc::string::String;
    use alloc::vec;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log, label: &'static str) -> Callback<Event> {
        let log = log.clone();
        Callback::new(move |_| {
            log.borrow_mut().push(String::from(label));
            Outcome::Continue
        })
    }

    /// root ─ a ─ b
    fn tree(caps: Capabilities) -> (TreeSource<Event>, NodeId, NodeId, NodeId) {
        let src = TreeSource::with_capabilities(caps);
        let root = src.add_root();
        let a = src.add_child(root);
        let b = src.add_child(a);
        (src, root, a, b)
    }

    fn bubble_only() -> (EventSystem<TreeSource<Event>>, NodeId, NodeId, NodeId) {
        let (src, root, a, b) = tree(Capabilities::ANCESTRY);
        (EventSystem::new(src), root, a, b)
    }

    fn native_capture() -> (EventSystem<TreeSource<Event>>, NodeId, NodeId, NodeId) {
        let (src, root, a, b) = tree(Capabilities::ANCESTRY | Capabilities::NATIVE_CAPTURE);
        (EventSystem::new(src), root, a, b)
    }

    #[test]
    fn identical_registration_yields_same_key_and_single_delivery() {
        let (sys, _, _, b) = bubble_only();
        let log = Log::default();
        let cb = recorder(&log, "b");
        let k1 = sys.listen(Target::Native(b), "click", &cb, ListenOptions::bubble());
        let k2 = sys.listen(Target::Native(b), "click", &cb, ListenOptions::bubble());
        assert_eq!(k1, k2);
        assert_eq!(sys.listener_count(), 1);
        assert_eq!(sys.adapter_count(), 1);

        sys.source().fire(b, &mut Event::new("click"));
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn emulated_capture_runs_before_bubble() {
        let (sys, root, a, b) = bubble_only();
        assert!(sys.emulates_capture());
        let log = Log::default();
        let (capture, bubble) = (ListenOptions::capture(), ListenOptions::bubble());
        sys.listen(Target::Native(a), "click", &recorder(&log, "a-capture"), capture);
        sys.listen(Target::Native(b), "click", &recorder(&log, "b-bubble"), bubble);
        sys.listen(Target::Native(root), "click", &recorder(&log, "root-bubble"), bubble);
        sys.listen(Target::Native(b), "click", &recorder(&log, "b-capture"), capture);

        assert!(sys.source().fire(b, &mut Event::new("click")));
        assert_eq!(
            *log.borrow(),
            vec!["a-capture", "b-capture", "b-bubble", "root-bubble"]
        );
    }

    #[test]
    fn native_capture_runs_before_bubble() {
        let (sys, root, a, b) = native_capture();
        assert!(!sys.emulates_capture());
        let log = Log::default();
        let (capture, bubble) = (ListenOptions::capture(), ListenOptions::bubble());
        sys.listen(Target::Native(a), "click", &recorder(&log, "a-capture"), capture);
        sys.listen(Target::Native(b), "click", &recorder(&log, "b-bubble"), bubble);
        sys.listen(Target::Native(root), "click", &recorder(&log, "root-bubble"), bubble);

        assert!(sys.source().fire(b, &mut Event::new("click")));
        assert_eq!(*log.borrow(), vec!["a-capture", "b-bubble", "root-bubble"]);
    }

    #[test]
    fn every_listener_on_the_chain_fires_once_per_physical_event() {
        let (sys, root, a, b) = bubble_only();
        let log = Log::default();
        for (node, label) in [(root, "root"), (a, "a"), (b, "b")] {
            let target = Target::Native(node);
            sys.listen(target, "click", &recorder(&log, label), ListenOptions::capture());
            sys.listen(target, "click", &recorder(&log, label), ListenOptions::bubble());
        }
        // Six physical subscriptions observe the event; the walk happens once.
        assert_eq!(sys.adapter_count(), 6);
        sys.source().fire(b, &mut Event::new("click"));
        assert_eq!(*log.borrow(), vec!["root", "a", "b", "b", "a", "root"]);

        log.borrow_mut().clear();
        sys.source().fire(b, &mut Event::new("click"));
        assert_eq!(log.borrow().len(), 6);
    }

    #[test]
    fn refiring_the_same_record_delivers_again() {
        for (sys, root, _, b) in [bubble_only(), native_capture()] {
            let log = Log::default();
            let root_capture = recorder(&log, "root");
            sys.listen(Target::Native(root), "click", &root_capture, ListenOptions::capture());
            sys.listen(Target::Native(b), "click", &recorder(&log, "b"), ListenOptions::bubble());

            let mut ev = Event::new("click");
            assert!(sys.source().fire(b, &mut ev));
            assert!(sys.source().fire(b, &mut ev));
            assert_eq!(*log.borrow(), vec!["root", "b", "root", "b"]);
        }
    }

    #[test]
    fn capture_stop_suppresses_target_bubble() {
        let (sys, _, a, b) = bubble_only();
        let log = Log::default();
        let stop = Callback::new(|ev: &mut Event| {
            ev.stop_propagation();
            Outcome::Continue
        });
        sys.listen(Target::Native(a), "click", &stop, ListenOptions::capture());
        sys.listen(Target::Native(b), "click", &recorder(&log, "b"), ListenOptions::bubble());

        sys.source().fire(b, &mut Event::new("click"));
        assert!(log.borrow().is_empty());

        // An unrelated listenable is unaffected.
        let other: Listenable<Event> = Listenable::new();
        other.listen("click", &recorder(&log, "other"), ListenOptions::bubble());
        assert!(sys.dispatch_event(&other, &mut Event::new("click")));
        assert_eq!(*log.borrow(), vec!["other"]);
    }

    #[test]
    fn prevent_default_anywhere_reports_prevented() {
        let (sys, root, _, b) = bubble_only();
        let veto = Callback::new(|_| Outcome::PreventDefault);
        let pass = Callback::new(|_| Outcome::Continue);
        sys.listen(Target::Native(root), "submit", &veto, ListenOptions::bubble());
        sys.listen(Target::Native(b), "submit", &pass, ListenOptions::bubble());
        assert!(!sys.source().fire(b, &mut Event::new("submit")));
        assert!(sys.source().fire(b, &mut Event::new("other")));
    }

    #[test]
    fn unlisten_reports_whether_anything_was_removed() {
        let (sys, _, a, _) = bubble_only();
        let cb = recorder(&Log::default(), "a");
        let scoped = ListenOptions::bubble().with_scope(Scope::new(1));
        sys.listen(Target::Native(a), "click", &cb, scoped);

        assert!(!sys.unlisten(Target::Native(a), "click", &cb, ListenOptions::bubble()));
        assert!(!sys.unlisten(Target::Native(a), "click", &cb, ListenOptions::capture()));
        assert!(sys.unlisten(Target::Native(a), "click", &cb, scoped));
        assert!(!sys.unlisten(Target::Native(a), "click", &cb, scoped));
        assert_eq!(sys.listener_count(), 0);
    }

    #[test]
    fn last_listener_tears_down_adapter_and_entry() {
        let (sys, _, a, _) = bubble_only();
        let log = Log::default();
        let (first, second) = (recorder(&log, "1"), recorder(&log, "2"));
        let k1 = sys.listen(Target::Native(a), "click", &first, ListenOptions::bubble());
        let k2 = sys.listen(Target::Native(a), "click", &second, ListenOptions::bubble());
        assert_eq!(sys.adapter_count(), 1);
        assert_eq!(sys.source().subscription_count(), 1);

        assert!(sys.unlisten_by_key(&k1));
        assert_eq!(sys.source().subscription_count(), 1);
        assert!(sys.unlisten_by_key(&k2));
        assert!(!sys.unlisten_by_key(&k2));
        assert_eq!(sys.adapter_count(), 0);
        assert_eq!(sys.source().subscription_count(), 0);
        assert!(!sys.has_listener(Target::Native(a), None, None));
    }

    #[test]
    fn removal_during_an_emulated_walk_skips_and_detaches() {
        let (sys, _, a, b) = bubble_only();
        let log = Log::default();
        let doomed: Rc<RefCell<Vec<ListenerKey<Event>>>> = Rc::default();
        let pending = Rc::clone(&doomed);
        let cleanup = Callback::new(move |_| {
            let keys: Vec<_> = pending.borrow_mut().drain(..).collect();
            for key in keys {
                assert!(key.unlisten());
            }
            Outcome::Continue
        });
        let own = sys.listen(Target::Native(b), "click", &cleanup, ListenOptions::bubble());
        let on_a = recorder(&log, "a");
        let on_a = sys.listen(Target::Native(a), "click", &on_a, ListenOptions::bubble());
        doomed.borrow_mut().extend([own, on_a]);
        assert_eq!(sys.source().subscription_count(), 2);

        assert!(sys.source().fire(b, &mut Event::new("click")));
        assert!(log.borrow().is_empty());
        assert_eq!(sys.source().subscription_count(), 0);
        assert_eq!(sys.listener_count(), 0);
        assert_eq!(sys.adapter_count(), 0);

        // Nothing is left to deliver to.
        sys.source().fire(b, &mut Event::new("click"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn remove_all_releases_everything_for_a_node() {
        let (sys, root, a, _) = bubble_only();
        let log = Log::default();
        let cbs: Vec<_> = (0..3).map(|_| recorder(&log, "x")).collect();
        sys.listen(Target::Native(a), "click", &cbs[0], ListenOptions::bubble());
        sys.listen(Target::Native(a), "click", &cbs[1], ListenOptions::capture());
        sys.listen(Target::Native(a), "keydown", &cbs[2], ListenOptions::bubble());
        let keep = sys.listen(Target::Native(root), "click", &cbs[0], ListenOptions::bubble());
        assert_eq!(sys.source().subscription_count(), 4);

        assert_eq!(sys.remove_all(Target::Native(a), Some("click")), 2);
        assert!(sys.has_listener(Target::Native(a), Some("keydown"), None));
        assert_eq!(sys.source().subscription_count(), 2);

        assert_eq!(sys.remove_all(Target::Native(a), None), 1);
        assert_eq!(sys.source().subscription_count(), 1);
        for (ty, cb, opts) in [
            ("click", &cbs[0], ListenOptions::bubble()),
            ("click", &cbs[1], ListenOptions::capture()),
            ("keydown", &cbs[2], ListenOptions::bubble()),
        ] {
            assert!(sys.get_listener(Target::Native(a), ty, cb, opts).is_none());
        }
        assert!(!keep.is_removed());
        assert_eq!(sys.remove_all(Target::Native(a), None), 0);
    }

    #[test]
    fn one_shot_fires_once_even_when_redispatching() {
        let (sys, _, _, b) = bubble_only();
        let calls = Rc::new(core::cell::Cell::new(0));
        let sys2 = sys.clone();
        let calls2 = calls.clone();
        sys.listen_once(
            Target::Native(b),
            "click",
            &Callback::new(move |_| {
                calls2.set(calls2.get() + 1);
                sys2.source().fire(b, &mut Event::new("click"));
                Outcome::Continue
            }),
            ListenOptions::bubble(),
        );
        sys.source().fire(b, &mut Event::new("click"));
        sys.source().fire(b, &mut Event::new("click"));
        assert_eq!(calls.get(), 1);
        assert_eq!(sys.listener_count(), 0);
        assert_eq!(sys.source().subscription_count(), 0);
    }

    #[test]
    fn listen_after_listen_once_makes_persistent() {
        let (sys, _, _, b) = bubble_only();
        let log = Log::default();
        let cb = recorder(&log, "b");
        let once = sys.listen_once(Target::Native(b), "click", &cb, ListenOptions::bubble());
        let again = sys.listen(Target::Native(b), "click", &cb, ListenOptions::bubble());
        assert_eq!(once, again);
        assert!(!again.is_one_shot());

        sys.source().fire(b, &mut Event::new("click"));
        sys.source().fire(b, &mut Event::new("click"));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn capture_policy_applies_without_native_capture() {
        let fail = EventSystem::with_config(
            TreeSource::<Event>::with_capabilities(Capabilities::ANCESTRY),
            Config::default().with_capture_policy(CapturePolicy::Fail),
        );
        let node = fail.source().add_root();
        let cb = Callback::new(|_| Outcome::Continue);
        assert!(!fail.emulates_capture());
        assert_eq!(
            fail.try_listen(Target::Native(node), "click", &cb, ListenOptions::capture()),
            Err(ListenError::CaptureUnsupported)
        );
        assert!(
            fail.try_listen(Target::Native(node), "click", &cb, ListenOptions::bubble())
                .is_ok()
        );

        // Emulation needs ancestry.
        let flat = EventSystem::new(TreeSource::<Event>::with_capabilities(Capabilities::empty()));
        let node = flat.source().add_root();
        assert_eq!(
            flat.try_listen(Target::Native(node), "click", &cb, ListenOptions::capture()),
            Err(ListenError::CaptureUnsupported)
        );

        let silent = EventSystem::with_config(
            TreeSource::<Event>::with_capabilities(Capabilities::ANCESTRY),
            Config::default().with_capture_policy(CapturePolicy::Silent),
        );
        let node = silent.source().add_root();
        let log = Log::default();
        let swallowed = recorder(&log, "c");
        let capture = ListenOptions::capture();
        let key = silent.listen(Target::Native(node), "click", &swallowed, capture);
        silent.listen(Target::Native(node), "click", &recorder(&log, "b"), ListenOptions::bubble());
        assert!(!key.is_removed());
        assert_eq!(silent.adapter_count(), 1);
        silent.source().fire(node, &mut Event::new("click"));
        assert_eq!(*log.borrow(), vec!["b"]);
        assert!(key.unlisten());
    }

    #[test]
    fn silent_capture_reregistration_is_idempotent() {
        let sys = EventSystem::with_config(
            TreeSource::<Event>::with_capabilities(Capabilities::ANCESTRY),
            Config::default().with_capture_policy(CapturePolicy::Silent),
        );
        let node = sys.source().add_root();
        let cb = Callback::new(|_| Outcome::Continue);
        let first = sys.listen(Target::Native(node), "click", &cb, ListenOptions::capture());
        let again = sys.listen(Target::Native(node), "click", &cb, ListenOptions::capture());
        assert_eq!(first, again);
        assert_eq!(sys.listener_count(), 1);
        assert_eq!(sys.adapter_count(), 0);
        assert_eq!(sys.source().subscription_count(), 0);
    }

    #[test]
    fn empty_event_type_is_a_usage_error() {
        let (sys, _, a, _) = bubble_only();
        let cb = Callback::new(|_| Outcome::Continue);
        assert_eq!(
            sys.try_listen(Target::Native(a), "", &cb, ListenOptions::bubble()),
            Err(ListenError::EmptyEventType)
        );
        let l: Listenable<Event> = Listenable::new();
        assert_eq!(
            sys.try_listen(&l, "", &cb, ListenOptions::bubble()),
            Err(ListenError::EmptyEventType)
        );
    }

    #[test]
    #[should_panic(expected = "event type must not be empty")]
    fn listen_panics_on_usage_error() {
        let (sys, _, a, _) = bubble_only();
        let cb = Callback::new(|_| Outcome::Continue);
        sys.listen(Target::Native(a), "", &cb, ListenOptions::bubble());
    }

    #[test]
    fn fire_listeners_targets_one_bucket() {
        let (sys, _, a, _) = bubble_only();
        let log = Log::default();
        sys.listen(Target::Native(a), "click", &recorder(&log, "cap"), ListenOptions::capture());
        sys.listen(Target::Native(a), "click", &recorder(&log, "bub"), ListenOptions::bubble());
        let mut ev = Event::new("click");
        assert!(sys.fire_listeners(Target::Native(a), "click", true, &mut ev));
        assert_eq!(*log.borrow(), vec!["cap"]);
        assert!(!ev.capture_marked());
    }

    #[test]
    fn get_listeners_lists_live_listeners_in_order() {
        let (sys, _, a, _) = bubble_only();
        let log = Log::default();
        let keys: Vec<_> = ["1", "2", "3"]
            .into_iter()
            .map(|label| {
                let cb = recorder(&log, label);
                sys.listen(Target::Native(a), "click", &cb, ListenOptions::bubble())
            })
            .collect();
        assert_eq!(sys.get_listeners(Target::Native(a), "click", false), keys);
        keys[1].unlisten();
        assert_eq!(sys.get_listeners(Target::Native(a), "click", false).len(), 2);
        assert!(sys.get_listeners(Target::Native(a), "click", true).is_empty());
        assert!(!keys[2].is_removed());
    }

    #[test]
    fn dropping_the_system_unsubscribes_everything() {
        let (src, _, a, b) = tree(Capabilities::ANCESTRY);
        let src = Rc::new(src);
        let sys = EventSystem::new(Rc::clone(&src));
        let cb = Callback::new(|_| Outcome::Continue);
        let key = sys.listen(Target::Native(a), "click", &cb, ListenOptions::bubble());
        sys.listen(Target::Native(b), "click", &cb, ListenOptions::capture());
        assert_eq!(src.subscription_count(), 2);
        drop(sys);
        assert_eq!(src.subscription_count(), 0);
        assert!(key.is_removed());
        assert!(!key.unlisten());
    }
}
