// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deployment-time configuration for an [`EventSystem`](crate::system::EventSystem).

/// What to do with capture listeners on a native source without native capture support.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CapturePolicy {
    /// Emulate the capture phase by walking the ancestor chain on each physical event.
    ///
    /// Requires [`Capabilities::ANCESTRY`](crate::native::Capabilities::ANCESTRY); a source
    /// without it rejects capture listeners as under [`CapturePolicy::Fail`].
    #[default]
    Emulate,
    /// Reject capture listeners with
    /// [`ListenError::CaptureUnsupported`](crate::error::ListenError::CaptureUnsupported).
    Fail,
    /// Accept capture listeners but never deliver to them.
    Silent,
}

/// Configuration for an event system.
///
/// ```
/// use understory_listener::config::{CapturePolicy, Config};
///
/// let config = Config::default().with_capture_policy(CapturePolicy::Fail);
/// assert_eq!(config.capture_policy, CapturePolicy::Fail);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Capture handling on sources without native capture.
    pub capture_policy: CapturePolicy,
}

impl Config {
    /// Set the capture policy.
    pub const fn with_capture_policy(mut self, policy: CapturePolicy) -> Self {
        self.capture_policy = policy;
        self
    }
}
