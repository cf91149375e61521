//! # Kind → listeners registry with isolated delivery.
//!
//! Provides [`Registry`], the single owner of every listener and of the
//! many-to-many mapping between listeners and [`EventKind`]s.
//!
//! ## Architecture
//! ```text
//! notify-tick
//!     │ drain()
//!     ▼
//! event ──► targets(kind) ──► listener1.on_event() ──► panic → logged, failures += 1
//!                        └──► listener2.on_event()
//!                        └──► listenerN.on_event()      (subscription order)
//! ```
//!
//! ## Rules
//! - **Atomic subscribe**: a duplicate (listener, kind) pair rejects the whole request.
//! - **Per-kind order**: listeners of one kind are invoked in subscription order.
//! - **Isolation**: a panicking listener doesn't stop delivery to the next one.
//! - **No locks during delivery**: `targets()` returns owned handles; the caller
//!   releases the registry lock before awaiting listeners.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a listener uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::FutureExt;

use crate::error::{DispatcherError, panic_message};
use crate::events::{Event, EventKind};
use crate::ids::ListenerId;

use super::listener::{Listener, ListenerSnapshot};

/// Invocation counters shared between the registry and in-flight deliveries.
#[derive(Debug, Default)]
pub(crate) struct FireStats {
    fires: AtomicU64,
    failures: AtomicU64,
    fired: Mutex<FiredAt>,
}

#[derive(Debug, Default, Clone, Copy)]
struct FiredAt {
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
}

impl FireStats {
    fn record(&self, at: DateTime<Utc>, failed: bool) {
        self.fires.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let mut fired = self.fired.lock().unwrap_or_else(PoisonError::into_inner);
        fired.first.get_or_insert(at);
        fired.last = Some(at);
    }

    fn fired_at(&self) -> FiredAt {
        *self.fired.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Listener handle plus its counters, detached from the registry lock.
#[derive(Clone)]
pub(crate) struct Target {
    listener: Listener,
    stats: Arc<FireStats>,
}

struct Entry {
    listener: Listener,
    kinds: Vec<EventKind>,
    stats: Arc<FireStats>,
}

/// Owner of listeners and their subscriptions.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<ListenerId, Entry>,
    /// Listener ids in first-registration order.
    order: Vec<ListenerId>,
    by_kind: HashMap<EventKind, Vec<ListenerId>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to every kind in `kinds`.
    ///
    /// Returns the kinds actually added (deduplicated, in request order).
    /// Nothing changes when `kinds` is empty or any requested kind is already subscribed.
    pub(crate) fn subscribe(
        &mut self,
        kinds: &[EventKind],
        listener: Listener,
    ) -> Result<Vec<EventKind>, DispatcherError> {
        let id = listener.id();
        let mut added: Vec<EventKind> = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if !added.contains(&kind) {
                added.push(kind);
            }
        }

        if added.is_empty() {
            return Err(DispatcherError::NoEventKinds { id });
        }
        if let Some(entry) = self.entries.get(&id) {
            if let Some(&kind) = added.iter().find(|k| entry.kinds.contains(k)) {
                return Err(DispatcherError::DuplicateListener { id, kind });
            }
        }

        let entry = self.entries.entry(id).or_insert_with(|| {
            self.order.push(id);
            Entry {
                listener,
                kinds: Vec::new(),
                stats: Arc::new(FireStats::default()),
            }
        });
        entry.kinds.extend_from_slice(&added);
        for &kind in &added {
            self.by_kind.entry(kind).or_default().push(id);
        }
        Ok(added)
    }

    /// Unsubscribes the listener from `kinds`; kinds it isn't subscribed to are ignored.
    ///
    /// Returns the kinds actually removed. The listener is dropped once it has no kinds left.
    pub(crate) fn unsubscribe(
        &mut self,
        kinds: &[EventKind],
        id: ListenerId,
    ) -> Result<Vec<EventKind>, DispatcherError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(DispatcherError::ListenerNotFound { id })?;

        let mut removed = Vec::new();
        entry.kinds.retain(|k| {
            if kinds.contains(k) {
                removed.push(*k);
                false
            } else {
                true
            }
        });
        let empty = entry.kinds.is_empty();

        for kind in &removed {
            if let Some(ids) = self.by_kind.get_mut(kind) {
                ids.retain(|l| *l != id);
                if ids.is_empty() {
                    self.by_kind.remove(kind);
                }
            }
        }
        if empty {
            self.entries.remove(&id);
            self.order.retain(|l| *l != id);
        }
        Ok(removed)
    }

    /// Unsubscribes the listener from every kind.
    pub(crate) fn unsubscribe_all(&mut self, id: ListenerId) -> Result<Vec<EventKind>, DispatcherError> {
        let kinds = self
            .entries
            .get(&id)
            .map(|e| e.kinds.clone())
            .ok_or(DispatcherError::ListenerNotFound { id })?;
        self.unsubscribe(&kinds, id)
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Listeners subscribed to `kind`, in subscription order.
    pub(crate) fn targets(&self, kind: EventKind) -> Vec<Target> {
        self.by_kind
            .get(&kind)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.entries.get(id))
                    .map(|e| Target {
                        listener: e.listener.clone(),
                        stats: Arc::clone(&e.stats),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of registered listeners.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of (listener, kind) subscriptions.
    pub(crate) fn bindings(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub(crate) fn snapshot(&self, id: ListenerId, locked: &HashSet<ListenerId>) -> Option<ListenerSnapshot> {
        self.entries.get(&id).map(|e| snapshot_of(e, locked))
    }

    /// Snapshots of every listener, in registration order.
    pub(crate) fn snapshots(&self, locked: &HashSet<ListenerId>) -> Vec<ListenerSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| snapshot_of(e, locked))
            .collect()
    }
}

fn snapshot_of(e: &Entry, locked: &HashSet<ListenerId>) -> ListenerSnapshot {
    let fired = e.stats.fired_at();
    ListenerSnapshot {
        id: e.listener.id(),
        name: e.listener.name().to_string(),
        created_at: e.listener.created_at(),
        events: e.kinds.clone(),
        locked: locked.contains(&e.listener.id()),
        fires: e.stats.fires.load(Ordering::Relaxed),
        failures: e.stats.failures.load(Ordering::Relaxed),
        first_fired_at: fired.first,
        last_fired_at: fired.last,
    }
}

/// Invokes every target with `event`, one after another.
///
/// Returns the number of invocations that panicked.
pub(crate) async fn deliver(targets: &[Target], event: &Event) -> usize {
    let mut failed = 0;
    for t in targets {
        let fut = t.listener.handler().on_event(event);
        let res = std::panic::AssertUnwindSafe(fut).catch_unwind().await;
        let panicked = res.is_err();
        if let Err(payload) = res {
            failed += 1;
            tracing::error!(
                listener.id = %t.listener.id(),
                listener.name = t.listener.name(),
                event.kind = %event.kind,
                event.seq = event.seq,
                panic = %panic_message(payload.as_ref()),
                "listener panicked"
            );
        }
        t.stats.record(Utc::now(), panicked);
    }
    failed
}
