// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The native event source collaborator.
//!
//! A native source is a platform-provided tree of nodes that can deliver events. The
//! listener core never stores anything on the platform's nodes; it keeps its own
//! side-table keyed by [`NativeSource::Node`] and talks to the platform only through a
//! subscribe/unsubscribe pair and, for capture emulation, a parent accessor.
//!
//! Each logical `(node, type, capture)` triple holds at most one physical subscription,
//! however many listeners share it.

use alloc::rc::Rc;
use core::fmt::Debug;
use core::hash::Hash;

use crate::types::EventRecord;

bitflags::bitflags! {
    /// What a native source can do for the listener core.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Delivers capture-phase subscriptions root → target before bubbling.
        const NATIVE_CAPTURE = 0b0000_0001;
        /// [`NativeSource::parent_of`] reports real ancestry, so capture can be emulated.
        const ANCESTRY       = 0b0000_0010;
    }
}

/// Callback a native source invokes for each physical delivery.
///
/// Arguments are the node the subscription was made on and the physical event. The
/// return value is `false` when the default action should be prevented.
pub type NativeProxy<N, E> = Rc<dyn Fn(N, &mut E) -> bool>;

/// A platform event source.
///
/// Implementations must not hold internal borrows while invoking a proxy: proxies run
/// listener callbacks, and those may subscribe, unsubscribe, or fire further events.
///
/// A physical delivery starts with [`EventRecord::clear_capture_mark`] on the event before
/// the first proxy runs, so a record delivered again is walked again.
pub trait NativeSource {
    /// Node handle. Used as the side-table key.
    type Node: Copy + Eq + Hash + Debug;
    /// The physical event type.
    type Event: EventRecord;
    /// Handle returned by [`NativeSource::subscribe`].
    type Subscription;

    /// What this source supports.
    fn capabilities(&self) -> Capabilities;

    /// Start delivering `event_type` events at `node` to `proxy`.
    ///
    /// `capture` is only ever `true` when the source reports
    /// [`Capabilities::NATIVE_CAPTURE`].
    fn subscribe(
        &self,
        node: Self::Node,
        event_type: &str,
        capture: bool,
        proxy: NativeProxy<Self::Node, Self::Event>,
    ) -> Self::Subscription;

    /// Stop a subscription made by [`NativeSource::subscribe`].
    fn unsubscribe(&self, subscription: Self::Subscription);

    /// Parent of `node`, or `None` at a root.
    fn parent_of(&self, node: Self::Node) -> Option<Self::Node> {
        let _ = node;
        None
    }
}

impl<T: NativeSource + ?Sized> NativeSource for Rc<T> {
    type Node = T::Node;
    type Event = T::Event;
    type Subscription = T::Subscription;

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn subscribe(
        &self,
        node: Self::Node,
        event_type: &str,
        capture: bool,
        proxy: NativeProxy<Self::Node, Self::Event>,
    ) -> Self::Subscription {
        (**self).subscribe(node, event_type, capture, proxy)
    }

    fn unsubscribe(&self, subscription: Self::Subscription) {
        (**self).unsubscribe(subscription);
    }

    fn parent_of(&self, node: Self::Node) -> Option<Self::Node> {
        (**self).parent_of(node)
    }
}
