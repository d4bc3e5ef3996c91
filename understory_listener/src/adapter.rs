// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native adapters: one physical subscription per `(node, type, capture)` triple.
//!
//! ## Delivery modes
//!
//! - [`Delivery::Native`]: the source orders phases itself. Each adapter subscribes with
//!   its own capture flag and, when called, fires only its own bucket.
//! - [`Delivery::Emulated`]: the source only bubbles. Every adapter subscribes as a
//!   bubble subscription; the first adapter to observe a physical event marks it and
//!   walks the whole ancestor chain (capture root → target, then bubble target → root).
//!   Adapters further up the chain see the mark and return without delivering, so each
//!   listener on the chain is reached at most once per physical event.
//!
//! An adapter counts the live listeners sharing it and is torn down, unsubscribing from
//! the source, when that count reaches zero.

use alloc::rc::Rc;

use smallvec::SmallVec;

use crate::dispatcher;
use crate::native::{NativeProxy, NativeSource};
use crate::system::Core;
use crate::types::{EventRecord, Phase};

/// How physical deliveries are turned into listener calls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The source delivers both phases in its own order.
    Native,
    /// The source only bubbles; capture is walked in software.
    Emulated,
}

pub(crate) struct NativeAdapter<S: NativeSource> {
    subscription: S::Subscription,
    live: usize,
}

impl<S: NativeSource + 'static> NativeAdapter<S> {
    /// Create the physical subscription for `(node, event_type, capture)`.
    pub(crate) fn attach(
        core: &Rc<Core<S>>,
        node: S::Node,
        event_type: &Rc<str>,
        capture: bool,
    ) -> Self {
        let delivery = core.delivery;
        let weak = Rc::downgrade(core);
        let ty = Rc::clone(event_type);
        let proxy: NativeProxy<S::Node, S::Event> =
            Rc::new(move |node: S::Node, event: &mut S::Event| {
                let Some(core) = weak.upgrade() else {
                    return true;
                };
                match delivery {
                    Delivery::Native => {
                        core.fire_node(node, &ty, Phase::from_capture(capture), event)
                    }
                    Delivery::Emulated => emulate_capture(&core, node, &ty, event),
                }
            });
        let physical_capture = capture && delivery == Delivery::Native;
        log::debug!(
            "attaching {delivery:?} adapter for `{event_type}` on {node:?} (capture: {capture})"
        );
        let subscription = core
            .source
            .subscribe(node, event_type, physical_capture, proxy);
        Self {
            subscription,
            live: 1,
        }
    }

    pub(crate) fn retain(&mut self) {
        self.live += 1;
    }

    /// Drop one listener. Returns `true` when none remain.
    pub(crate) fn release(&mut self) -> bool {
        debug_assert!(self.live > 0, "adapter released more often than retained");
        self.live = self.live.saturating_sub(1);
        self.live == 0
    }

    /// Remove the physical subscription.
    pub(crate) fn detach(self, source: &S) {
        source.unsubscribe(self.subscription);
    }
}

impl<S: NativeSource> core::fmt::Debug for NativeAdapter<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NativeAdapter")
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

/// The capture and bubble adapters for one event type on one node.
pub(crate) struct AdapterSlots<S: NativeSource> {
    capture: Option<NativeAdapter<S>>,
    bubble: Option<NativeAdapter<S>>,
}

impl<S: NativeSource> AdapterSlots<S> {
    pub(crate) fn get(&self, capture: bool) -> Option<&NativeAdapter<S>> {
        if capture {
            self.capture.as_ref()
        } else {
            self.bubble.as_ref()
        }
    }

    pub(crate) fn get_mut(&mut self, capture: bool) -> Option<&mut NativeAdapter<S>> {
        self.slot(capture).as_mut()
    }

    pub(crate) fn put(&mut self, capture: bool, adapter: NativeAdapter<S>) {
        debug_assert!(self.get(capture).is_none(), "adapter slot already taken");
        *self.slot(capture) = Some(adapter);
    }

    pub(crate) fn take(&mut self, capture: bool) -> Option<NativeAdapter<S>> {
        self.slot(capture).take()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.capture.is_none() && self.bubble.is_none()
    }

    pub(crate) fn len(&self) -> usize {
        usize::from(self.capture.is_some()) + usize::from(self.bubble.is_some())
    }

    pub(crate) fn into_adapters(self) -> impl Iterator<Item = NativeAdapter<S>> {
        [self.capture, self.bubble].into_iter().flatten()
    }

    fn slot(&mut self, capture: bool) -> &mut Option<NativeAdapter<S>> {
        if capture {
            &mut self.capture
        } else {
            &mut self.bubble
        }
    }
}

impl<S: NativeSource> Default for AdapterSlots<S> {
    fn default() -> Self {
        Self {
            capture: None,
            bubble: None,
        }
    }
}

/// Collect `node` and its ancestors in target→root order.
///
/// The source must report an acyclic ancestry.
pub(crate) fn ancestors<S: NativeSource>(source: &S, node: S::Node) -> SmallVec<[S::Node; 16]> {
    let mut out = SmallVec::new();
    let mut cur = node;
    loop {
        out.push(cur);
        match source.parent_of(cur) {
            Some(p) => cur = p,
            None => break,
        }
    }
    out
}

/// Walk capture and bubble for one physical event observed at `node`.
pub(crate) fn emulate_capture<S: NativeSource + 'static>(
    core: &Core<S>,
    node: S::Node,
    event_type: &str,
    event: &mut S::Event,
) -> bool {
    if event.capture_marked() {
        // Already walked from a descendant's adapter.
        return true;
    }
    event.mark_capture();

    let chain = ancestors(&core.source, node);
    log::debug!(
        "emulating capture for `{event_type}` from {node:?} over {} nodes",
        chain.len()
    );
    let steps = dispatcher::two_phase(&chain);
    let result = dispatcher::run(&steps, event, |step, ev| {
        core.fire_node(step.node, event_type, step.phase, ev)
    });
    result && !event.default_prevented()
}
