// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Usage errors reported by registration and removal.
//!
//! Benign no-ops, such as removing a listener twice, are not errors: they return `false`
//! or `None`. The `try_*` entry points return these errors; the plain entry points panic
//! with the error's message at the caller's location.

/// A registration or removal the caller should not have attempted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ListenError {
    /// The event type was the empty string.
    #[error("event type must not be empty")]
    EmptyEventType,
    /// A capture listener was requested on a source that can neither deliver capture
    /// natively nor have it emulated under the configured policy.
    #[error("capture listeners are not supported by this event source")]
    CaptureUnsupported,
    /// A key was handed to a target that does not own it.
    #[error("listener key belongs to a different event target")]
    ForeignKey,
}

/// Panic with the error's message, attributed to the caller.
#[track_caller]
pub(crate) fn usage<T>(result: Result<T, ListenError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}
