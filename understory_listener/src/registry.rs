// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-source listener table.
//!
//! Maps event type to the listeners registered for it, in registration order. Capture
//! and bubble listeners of one type share a bucket; their relative order only matters
//! within a phase, and within a phase it is insertion order.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::listener::{Callback, ListenerFlags, ListenerKey, ListenerSource};
use crate::types::{Phase, Scope};

/// Listeners snapshotted for one delivery pass.
pub(crate) type Snapshot<E> = SmallVec<[ListenerKey<E>; 8]>;

pub(crate) struct ListenerRegistry<E> {
    buckets: HashMap<Rc<str>, Vec<ListenerKey<E>>>,
    len: usize,
}

impl<E> ListenerRegistry<E> {
    pub(crate) fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            len: 0,
        }
    }

    /// Idempotent upsert keyed by `(type, capture, callback, scope)`.
    ///
    /// Returns the listener and whether it was newly created. An existing one-shot
    /// listener is converted to persistent in place when `one_shot` is `false`.
    pub(crate) fn add(
        &mut self,
        event_type: &str,
        callback: &Callback<E>,
        one_shot: bool,
        capture: bool,
        scope: Option<Scope>,
        owner: &Weak<dyn ListenerSource<E>>,
    ) -> (ListenerKey<E>, bool) {
        if let Some(existing) = self.get_listener(event_type, callback, capture, scope) {
            if !one_shot {
                existing.make_persistent();
            }
            return (existing, false);
        }

        let mut flags = ListenerFlags::empty();
        flags.set(ListenerFlags::CAPTURE, capture);
        flags.set(ListenerFlags::ONE_SHOT, one_shot);

        let bucket = self.buckets.entry_ref(event_type).or_default();
        // Reuse the bucket's shared type name when there is one.
        let name = bucket
            .first()
            .map(|k| Rc::clone(k.event_type_rc()))
            .unwrap_or_else(|| Rc::from(event_type));
        let key = ListenerKey::new(name, callback.clone(), flags, scope, owner.clone());
        bucket.push(key.clone());
        self.len += 1;
        (key, true)
    }

    pub(crate) fn get_listener(
        &self,
        event_type: &str,
        callback: &Callback<E>,
        capture: bool,
        scope: Option<Scope>,
    ) -> Option<ListenerKey<E>> {
        self.buckets
            .get(event_type)?
            .iter()
            .find(|k| !k.is_removed() && k.matches(callback, capture, scope))
            .cloned()
    }

    /// Tombstone `key` and splice it out of its bucket.
    pub(crate) fn remove_by_key(&mut self, key: &ListenerKey<E>) -> bool {
        let Some(bucket) = self.buckets.get_mut(key.event_type()) else {
            return false;
        };
        let Some(idx) = bucket.iter().position(|k| k == key) else {
            return false;
        };
        key.mark_removed();
        bucket.remove(idx);
        self.len -= 1;
        if bucket.is_empty() {
            self.buckets.remove(key.event_type());
        }
        true
    }

    /// Tombstone and drop every listener, or every listener of one type.
    ///
    /// Returns the removed keys so the caller can release whatever they held.
    pub(crate) fn remove_all(&mut self, event_type: Option<&str>) -> Vec<ListenerKey<E>> {
        let removed: Vec<ListenerKey<E>> = match event_type {
            Some(ty) => self.buckets.remove(ty).unwrap_or_default(),
            None => self.buckets.drain().flat_map(|(_, bucket)| bucket).collect(),
        };
        for key in &removed {
            key.mark_removed();
        }
        self.len -= removed.len();
        removed
    }

    /// Live listeners for `(type, phase)` in registration order.
    pub(crate) fn snapshot(&self, event_type: &str, phase: Phase) -> Snapshot<E> {
        let capture = phase.is_capture();
        self.buckets
            .get(event_type)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|k| k.is_capture() == capture && !k.is_removed())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn has_listener(&self, event_type: Option<&str>, capture: Option<bool>) -> bool {
        let matches = |bucket: &Vec<ListenerKey<E>>| {
            bucket
                .iter()
                .any(|k| capture.is_none_or(|c| k.is_capture() == c))
        };
        match event_type {
            Some(ty) => self.buckets.get(ty).is_some_and(matches),
            None => self.buckets.values().any(matches),
        }
    }

    /// Number of non-empty type buckets.
    pub(crate) fn type_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.type_count() == 0
    }
}

impl<E> core::fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("types", &self.type_count())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
