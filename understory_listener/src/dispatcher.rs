// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delivery: fire one listener bucket, or walk an ancestor chain in two phases.
//!
//! Both native nodes and listenables deliver through the functions here, so the
//! ordering and reentrancy rules are identical for the two target kinds.
//!
//! ## Semantics
//!
//! - [`fire_listeners`] snapshots the `(type, phase)` bucket before calling anything.
//!   Listeners added during delivery wait for the next pass; listeners removed during
//!   delivery are skipped when reached.
//! - One-shot listeners are unregistered before their callback runs, so a callback that
//!   re-dispatches the same type cannot reach itself again.
//! - In the capture phase a stopped event skips the rest of the bucket. In the bubble
//!   phase the bucket completes and only further nodes are skipped.
//! - [`run`] walks a capture → bubble step sequence and stops before the next step once
//!   propagation is stopped. A stop raised in capture therefore suppresses the whole
//!   bubble phase, including the target's own bubble listeners.
//! - Results are the logical AND of every listener's outcome, and are `false` when the
//!   event's default was prevented.
//!
//! A panicking callback is not caught. It unwinds out of the dispatch and the listeners
//! after it in the current pass are not called.

use core::cell::RefCell;

use smallvec::SmallVec;

use crate::registry::ListenerRegistry;
use crate::types::{EventRecord, Phase};

/// One entry of a dispatch sequence: which node's bucket to fire, in which phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Step<N> {
    pub(crate) phase: Phase,
    pub(crate) node: N,
}

pub(crate) type Steps<N> = SmallVec<[Step<N>; 16]>;

/// Build capture root→target followed by bubble target→root.
///
/// `chain` is in target→root order and includes the target.
pub(crate) fn two_phase<N: Clone>(chain: &[N]) -> Steps<N> {
    let mut out = Steps::with_capacity(chain.len() * 2);
    for node in chain.iter().rev() {
        out.push(Step {
            phase: Phase::Capture,
            node: node.clone(),
        });
    }
    for node in chain {
        out.push(Step {
            phase: Phase::Bubble,
            node: node.clone(),
        });
    }
    out
}

/// Walk a step sequence, honoring stopped propagation between steps.
///
/// Returns the AND of every `fire` result.
pub(crate) fn run<N, E: EventRecord>(
    steps: &[Step<N>],
    event: &mut E,
    mut fire: impl FnMut(&Step<N>, &mut E) -> bool,
) -> bool {
    let mut result = true;
    for (i, step) in steps.iter().enumerate() {
        if event.propagation_stopped() {
            log::trace!(
                "propagation of `{}` stopped before step {i} ({:?})",
                event.event_type(),
                step.phase
            );
            break;
        }
        result &= fire(step, event);
    }
    result
}

/// Deliver `event` to the live `(event_type, phase)` listeners of one registry.
///
/// The registry is only borrowed while taking the snapshot; callbacks run with no
/// borrow held and may freely listen, unlisten, or dispatch.
pub(crate) fn fire_listeners<E: EventRecord>(
    registry: &RefCell<ListenerRegistry<E>>,
    event_type: &str,
    phase: Phase,
    event: &mut E,
) -> bool {
    let snapshot = registry.borrow().snapshot(event_type, phase);
    let mut result = true;
    for key in &snapshot {
        if key.is_removed() {
            continue;
        }
        if phase.is_capture() && event.propagation_stopped() {
            break;
        }
        if key.is_one_shot() {
            key.unlisten();
        }
        result &= key.callback().call(event).is_continue();
    }
    result && !event.default_prevented()
}
