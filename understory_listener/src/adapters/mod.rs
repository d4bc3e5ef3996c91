// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native sources for use with [`EventSystem`](crate::system::EventSystem).
//!
//! Platform integrations implement [`NativeSource`](crate::native::NativeSource) in their own
//! crates. The sources here are self-contained and gated behind feature flags.
//!
//! ## Available Sources
//!
//! - [`tree`] (`tree_source` feature, on by default): an in-memory node tree that delivers
//!   events bubble-only, or capture-then-bubble when constructed with
//!   [`Capabilities::NATIVE_CAPTURE`](crate::native::Capabilities::NATIVE_CAPTURE).
//!   Useful for tests, demos, and headless hosts.

#[cfg(any(test, feature = "tree_source"))]
pub mod tree;
