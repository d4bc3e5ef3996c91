// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-memory native source: a tree of nodes with per-node subscriptions.
//!
//! ## Feature
//!
//! Enable with `tree_source` (on by default).
//!
//! ## Delivery
//!
//! [`TreeSource::fire`] delivers an event at a target node the way a platform would:
//!
//! - with [`Capabilities::NATIVE_CAPTURE`], capture subscriptions root → target first;
//! - then bubble subscriptions target → root.
//!
//! Propagation is checked between nodes; every subscription on a node observes the event
//! once delivery reaches that node. Subscriptions are invoked with no internal borrow held,
//! so proxies may subscribe, unsubscribe, or fire again.

use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use smallvec::SmallVec;

use crate::native::{Capabilities, NativeProxy, NativeSource};
use crate::types::EventRecord;

/// Identifier of a node in a [`TreeSource`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Index of the node in creation order.
    pub const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Handle for one physical subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

struct Subscription<E> {
    id: SubscriptionId,
    node: NodeId,
    event_type: String,
    capture: bool,
    proxy: NativeProxy<NodeId, E>,
}

/// A node tree that delivers events to subscriptions.
pub struct TreeSource<E> {
    capabilities: Capabilities,
    parents: RefCell<Vec<Option<NodeId>>>,
    subscriptions: RefCell<Vec<Subscription<E>>>,
    next_id: Cell<usize>,
}

impl<E: EventRecord> TreeSource<E> {
    /// A bubble-only source that reports ancestry.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::ANCESTRY)
    }

    /// A source reporting `capabilities`.
    ///
    /// Without [`Capabilities::ANCESTRY`] the tree is still walked when firing, but
    /// [`NativeSource::parent_of`] answers `None`.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            parents: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Add a node without a parent.
    pub fn add_root(&self) -> NodeId {
        self.push(None)
    }

    /// Add a node under `parent`.
    pub fn add_child(&self, parent: NodeId) -> NodeId {
        debug_assert!(parent.idx() < self.parents.borrow().len(), "unknown parent");
        self.push(Some(parent))
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Deliver `event` at `target`.
    ///
    /// Returns `false` if any subscription reported a prevented default or the event's
    /// default was prevented.
    pub fn fire(&self, target: NodeId, event: &mut E) -> bool {
        event.clear_capture_mark();
        let event_type = String::from(event.event_type());
        let path = self.path(target);
        let mut steps: SmallVec<[(NodeId, bool); 32]> = SmallVec::new();
        if self.capabilities.contains(Capabilities::NATIVE_CAPTURE) {
            steps.extend(path.iter().rev().map(|&node| (node, true)));
        }
        steps.extend(path.iter().map(|&node| (node, false)));

        let mut result = true;
        for (node, capture) in steps {
            if event.propagation_stopped() {
                break;
            }
            result &= self.deliver(node, &event_type, capture, event);
        }
        result && !event.default_prevented()
    }

    fn push(&self, parent: Option<NodeId>) -> NodeId {
        let mut parents = self.parents.borrow_mut();
        let id = NodeId(u32::try_from(parents.len()).unwrap_or(u32::MAX));
        parents.push(parent);
        id
    }

    /// `target` and its ancestors, target first.
    fn path(&self, target: NodeId) -> SmallVec<[NodeId; 16]> {
        let parents = self.parents.borrow();
        let mut out = SmallVec::new();
        let mut cur = Some(target);
        while let Some(node) = cur {
            out.push(node);
            cur = parents.get(node.idx()).copied().flatten();
        }
        out
    }

    fn deliver(&self, node: NodeId, event_type: &str, capture: bool, event: &mut E) -> bool {
        let proxies: SmallVec<[(SubscriptionId, NativeProxy<NodeId, E>); 4]> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.node == node && s.capture == capture && s.event_type == event_type)
            .map(|s| (s.id, s.proxy.clone()))
            .collect();
        let mut result = true;
        for (id, proxy) in proxies {
            // Unsubscribed by an earlier proxy on this node.
            if !self.subscriptions.borrow().iter().any(|s| s.id == id) {
                continue;
            }
            result &= proxy(node, event);
        }
        result
    }
}

impl<E: EventRecord> Default for TreeSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> core::fmt::Debug for TreeSource<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TreeSource")
            .field("capabilities", &self.capabilities)
            .field("nodes", &self.parents.borrow().len())
            .field("subscriptions", &self.subscriptions.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<E: EventRecord> NativeSource for TreeSource<E> {
    type Node = NodeId;
    type Event = E;
    type Subscription = SubscriptionId;

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn subscribe(
        &self,
        node: NodeId,
        event_type: &str,
        capture: bool,
        proxy: NativeProxy<NodeId, E>,
    ) -> SubscriptionId {
        debug_assert!(
            !capture || self.capabilities.contains(Capabilities::NATIVE_CAPTURE),
            "capture subscription on a bubble-only source"
        );
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            node,
            event_type: String::from(event_type),
            capture,
            proxy,
        });
        id
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        let removed = {
            let mut subs = self.subscriptions.borrow_mut();
            subs.iter()
                .position(|s| s.id == subscription)
                .map(|idx| subs.remove(idx))
        };
        debug_assert!(removed.is_some(), "unknown subscription {subscription:?}");
        // Proxies are dropped outside the borrow.
        drop(removed);
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        if !self.capabilities.contains(Capabilities::ANCESTRY) {
            return None;
        }
        self.parents.borrow().get(node.idx()).copied().flatten()
    }
}
