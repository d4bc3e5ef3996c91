// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types: event records, listener outcomes, scopes, and registration options.

use alloc::rc::Rc;
use alloc::string::String;

/// The dispatch-relevant view of an event.
///
/// The listener core only reads and writes the fields exposed here; everything else on
/// an event is payload owned by whoever produced it.
///
/// The capture marker is transient state used by capture emulation on native sources
/// that only deliver bubble-phase callbacks. It guarantees a physical event is walked
/// at most once even when several adapters along its ancestor chain observe it.
pub trait EventRecord {
    /// The event type tag, for example `"click"` or `"action"`.
    fn event_type(&self) -> &str;

    /// Whether a listener has asked to stop propagation.
    fn propagation_stopped(&self) -> bool;

    /// Stop propagation to nodes not yet reached.
    fn stop_propagation(&mut self);

    /// Whether a listener has asked to suppress the default action.
    fn default_prevented(&self) -> bool;

    /// Suppress the default action.
    fn prevent_default(&mut self);

    /// Whether capture emulation has already walked this physical event.
    fn capture_marked(&self) -> bool;

    /// Record that capture emulation has walked this physical event.
    fn mark_capture(&mut self);

    /// Forget the capture marker. Native sources call this when a physical delivery starts.
    fn clear_capture_mark(&mut self);
}

/// A stock event record carrying an arbitrary payload.
///
/// ```
/// use understory_listener::types::{Event, EventRecord};
///
/// let mut ev = Event::with_payload("select", 3_usize);
/// assert_eq!(ev.event_type(), "select");
/// assert_eq!(ev.payload, 3);
///
/// ev.prevent_default();
/// assert!(ev.default_prevented());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event<P = ()> {
    event_type: String,
    /// Producer-owned data passed through untouched.
    pub payload: P,
    propagation_stopped: bool,
    default_prevented: bool,
    capture_marked: bool,
}

impl Event<()> {
    /// Create an event of the given type with no payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::with_payload(event_type, ())
    }
}

impl<P> Event<P> {
    /// Create an event of the given type carrying `payload`.
    pub fn with_payload(event_type: impl Into<String>, payload: P) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            propagation_stopped: false,
            default_prevented: false,
            capture_marked: false,
        }
    }
}

impl<P> EventRecord for Event<P> {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    fn capture_marked(&self) -> bool {
        self.capture_marked
    }

    fn mark_capture(&mut self) {
        self.capture_marked = true;
    }

    fn clear_capture_mark(&mut self) {
        self.capture_marked = false;
    }
}

/// What a listener callback reports back to the dispatcher.
///
/// [`Outcome::PreventDefault`] is the "return false" convention: any listener reporting
/// it makes the whole dispatch report the default as prevented. It does not stop
/// propagation; use [`EventRecord::stop_propagation`] for that.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report.
    #[default]
    Continue,
    /// Ask the dispatch caller to skip the default action.
    PreventDefault,
}

impl Outcome {
    /// `true` for [`Outcome::Continue`].
    pub const fn is_continue(self) -> bool {
        matches!(self, Self::Continue)
    }
}

impl From<bool> for Outcome {
    fn from(keep_default: bool) -> Self {
        if keep_default {
            Self::Continue
        } else {
            Self::PreventDefault
        }
    }
}

/// Opaque identity of the object a listener is bound to.
///
/// Scope takes part in listener identity: the same callback registered with two
/// different scopes is two registrations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scope(u64);

impl Scope {
    /// A scope from an explicit id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// A scope derived from the address of a shared value.
    ///
    /// The scope is only meaningful while `value` is alive; a freed allocation may be
    /// reused by a later value and yield the same scope.
    pub fn of<T: ?Sized>(value: &Rc<T>) -> Self {
        Self(Rc::as_ptr(value).cast::<()>() as usize as u64)
    }

    /// The raw id.
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Dispatch phase of a listener bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Root → target.
    Capture,
    /// Target → root.
    Bubble,
}

impl Phase {
    /// The phase a registration with the given capture flag belongs to.
    pub const fn from_capture(capture: bool) -> Self {
        if capture { Self::Capture } else { Self::Bubble }
    }

    /// `true` for [`Phase::Capture`].
    pub const fn is_capture(self) -> bool {
        matches!(self, Self::Capture)
    }
}

/// Registration options: the capture flag and the bound scope.
///
/// ```
/// use understory_listener::types::{ListenOptions, Scope};
///
/// let opts = ListenOptions::capture().with_scope(Scope::new(7));
/// assert!(opts.capture);
/// assert_eq!(opts.scope, Some(Scope::new(7)));
/// assert_eq!(ListenOptions::default(), ListenOptions::bubble());
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Deliver during the capture phase instead of the bubble phase.
    pub capture: bool,
    /// Bound scope, part of listener identity.
    pub scope: Option<Scope>,
}

impl ListenOptions {
    /// Bubble-phase registration with no scope.
    pub const fn bubble() -> Self {
        Self {
            capture: false,
            scope: None,
        }
    }

    /// Capture-phase registration with no scope.
    pub const fn capture() -> Self {
        Self {
            capture: true,
            scope: None,
        }
    }

    /// Set the bound scope.
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// The phase these options register for.
    pub const fn phase(&self) -> Phase {
        Phase::from_capture(self.capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_bool_follows_return_false_convention() {
        assert_eq!(Outcome::from(true), Outcome::Continue);
        assert_eq!(Outcome::from(false), Outcome::PreventDefault);
        assert!(!Outcome::PreventDefault.is_continue());
    }

    #[test]
    fn scope_of_tracks_allocation_identity() {
        let a = Rc::new(1_u8);
        let b = Rc::new(1_u8);
        assert_eq!(Scope::of(&a), Scope::of(&a.clone()));
        assert_ne!(Scope::of(&a), Scope::of(&b));
    }

    #[test]
    fn fresh_event_has_clear_flags() {
        let ev = Event::new("action");
        assert!(!ev.propagation_stopped());
        assert!(!ev.default_prevented());
        assert!(!ev.capture_marked());
    }

    #[test]
    fn capture_mark_can_be_cleared() {
        let mut ev = Event::new("action");
        ev.mark_capture();
        assert!(ev.capture_marked());
        ev.clear_capture_mark();
        assert!(!ev.capture_marked());
    }
}
