// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_listener --heading-base-level=0

//! Understory Listener: a `no_std` event listener registry with capture → bubble dispatch.
//!
//! ## Overview
//!
//! This crate registers callbacks for named event types on two kinds of target and
//! delivers events to them in a deterministic order:
//!
//! - **Native nodes** belong to a platform event source ([`NativeSource`](crate::native::NativeSource)).
//!   The [`EventSystem`](crate::system::EventSystem) keeps a side-table from node to listeners and
//!   holds one physical subscription per `(node, type, capture)` triple, however many listeners share it.
//! - **Listenables** ([`Listenable`](crate::listenable::Listenable)) are in-process targets that own
//!   their listeners and may have a parent. Dispatch walks the parent chain.
//!
//! ## Registration
//!
//! A listener is identified by `(target, type, capture, callback, scope)`. Registering the same tuple
//! twice returns the existing [`ListenerKey`](crate::listener::ListenerKey). Callback identity is the
//! identity of the shared [`Callback`](crate::listener::Callback); clone a callback to register or remove it again.
//! [`listen_once`](crate::system::EventSystem::listen_once) registers a listener that removes itself
//! before its first delivery.
//!
//! ## Ordering
//!
//! Within one `(target, type, phase)` listeners fire in registration order. Across a chain, capture
//! listeners fire root → target, then bubble listeners target → root. Stopping propagation in capture
//! ends the dispatch; stopping it in bubble finishes the current node first.
//!
//! ## Capture emulation
//!
//! When a native source cannot deliver capture itself but reports ancestry, the system emulates it:
//! the first adapter to observe a physical event walks the whole ancestor chain, and adapters further
//! up recognise the event as already handled. See [`CapturePolicy`](crate::config::CapturePolicy) for
//! the alternatives.
//!
//! ## Reentrancy
//!
//! Listeners may listen, unlisten, or dispatch from inside a callback. A delivery pass works from a
//! snapshot: listeners added during it wait for the next pass, and listeners removed during it are
//! skipped when reached.
//!
//! ## Example
//!
//! ```
//! use understory_listener::adapters::tree::TreeSource;
//! use understory_listener::listener::Callback;
//! use understory_listener::system::{EventSystem, Target};
//! use understory_listener::types::{Event, ListenOptions, Outcome};
//!
//! let system = EventSystem::new(TreeSource::<Event>::new());
//! let panel = system.source().add_root();
//! let button = system.source().add_child(panel);
//!
//! let on_action = Callback::new(|_: &mut Event| Outcome::Continue);
//! let key = system.listen(Target::Native(button), "action", &on_action, ListenOptions::bubble());
//! assert_eq!(
//!     system.listen(Target::Native(button), "action", &on_action, ListenOptions::bubble()),
//!     key
//! );
//!
//! let guard = Callback::new(|_: &mut Event| Outcome::PreventDefault);
//! system.listen(Target::Native(panel), "action", &guard, ListenOptions::capture());
//!
//! // The panel's capture listener runs first and vetoes the default action.
//! assert!(!system.source().fire(button, &mut Event::new("action")));
//!
//! assert!(key.unlisten());
//! assert!(!system.has_listener(Target::Native(button), None, None));
//! ```
//!
//! ## Logging
//!
//! Registration and removal are logged at `trace` level through the [`log`] facade, adapter
//! lifecycle and emulated walks at `debug`, and swallowed capture registrations at `warn`.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod adapter;
mod dispatcher;
mod registry;

pub mod adapters;
pub mod config;
pub mod error;
pub mod handler;
pub mod listenable;
pub mod listener;
pub mod native;
pub mod system;
pub mod types;

pub use config::{CapturePolicy, Config};
pub use error::ListenError;
pub use handler::EventHandler;
pub use listenable::Listenable;
pub use listener::{Callback, HandleEvent, ListenerKey, unlisten_by_key};
pub use native::{Capabilities, NativeSource};
pub use system::{EventSystem, Target};
pub use types::{Event, EventRecord, ListenOptions, Outcome, Phase, Scope};
