// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Owned groups of registrations.
//!
//! An [`EventHandler`] registers listeners through an [`EventSystem`] and remembers the
//! keys. Clearing it, or dropping it, removes everything it still holds, which ties a
//! group of listeners to the lifetime of one component.
//!
//! ```
//! use understory_listener::adapters::tree::TreeSource;
//! use understory_listener::handler::EventHandler;
//! use understory_listener::listener::Callback;
//! use understory_listener::system::{EventSystem, Target};
//! use understory_listener::types::{Event, ListenOptions, Outcome};
//!
//! let system = EventSystem::new(TreeSource::<Event>::new());
//! let node = system.source().add_root();
//! {
//!     let mut handler = EventHandler::new(&system);
//!     let on_click = Callback::new(|_| Outcome::Continue);
//!     handler.listen(Target::Native(node), "click", &on_click, ListenOptions::bubble());
//!     assert_eq!(system.listener_count(), 1);
//! }
//! assert_eq!(system.listener_count(), 0);
//! assert_eq!(system.source().subscription_count(), 0);
//! ```

use alloc::vec::Vec;

use hashbrown::HashSet;

use crate::listener::{Callback, ListenerKey};
use crate::native::NativeSource;
use crate::system::{EventSystem, Target};
use crate::types::{ListenOptions, Scope};

/// A bag of listener keys that are removed together.
pub struct EventHandler<S: NativeSource + 'static> {
    system: EventSystem<S>,
    scope: Option<Scope>,
    keys: HashSet<ListenerKey<S::Event>>,
}

impl<S: NativeSource + 'static> EventHandler<S> {
    /// Create an empty handler registering through `system`.
    pub fn new(system: &EventSystem<S>) -> Self {
        Self {
            system: system.clone(),
            scope: None,
            keys: HashSet::new(),
        }
    }

    /// Apply `scope` to registrations that do not name one.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Register a listener and keep its key.
    #[track_caller]
    pub fn listen<'a>(
        &mut self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> ListenerKey<S::Event> {
        let key = self
            .system
            .listen(target, event_type, callback, self.options(options));
        self.track(key)
    }

    /// Register a one-shot listener and keep its key.
    #[track_caller]
    pub fn listen_once<'a>(
        &mut self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> ListenerKey<S::Event> {
        let key = self
            .system
            .listen_once(target, event_type, callback, self.options(options));
        self.track(key)
    }

    /// Remove a listener registered through this handler.
    ///
    /// Returns `false` if no matching listener is held.
    pub fn unlisten<'a>(
        &mut self,
        target: impl Into<Target<'a, S::Node, S::Event>>,
        event_type: &str,
        callback: &Callback<S::Event>,
        options: ListenOptions,
    ) -> bool {
        let Some(key) = self
            .system
            .get_listener(target, event_type, callback, self.options(options))
        else {
            return false;
        };
        self.keys.remove(&key) && key.unlisten()
    }

    /// Remove every listener this handler still holds. Returns how many were live.
    pub fn remove_all(&mut self) -> usize {
        let keys: Vec<_> = self.keys.drain().collect();
        keys.iter().filter(|key| key.unlisten()).count()
    }

    /// Number of held listeners that are still registered.
    pub fn len(&self) -> usize {
        self.keys.iter().filter(|k| !k.is_removed()).count()
    }

    /// Whether no held listener is still registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Held keys that are still registered, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &ListenerKey<S::Event>> {
        self.keys.iter().filter(|k| !k.is_removed())
    }

    fn options(&self, mut options: ListenOptions) -> ListenOptions {
        if options.scope.is_none() {
            options.scope = self.scope;
        }
        options
    }

    fn track(&mut self, key: ListenerKey<S::Event>) -> ListenerKey<S::Event> {
        // One-shot listeners that already fired are dropped here.
        self.keys.retain(|k| !k.is_removed());
        self.keys.insert(key.clone());
        key
    }
}

impl<S: NativeSource + 'static> Drop for EventHandler<S> {
    fn drop(&mut self) {
        self.remove_all();
    }
}

impl<S: NativeSource + 'static> core::fmt::Debug for EventHandler<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventHandler")
            .field("scope", &self.scope)
            .field("keys", &self.len())
            .finish_non_exhaustive()
    }
}
