//! # Pending-event queue.
//!
//! [`EventQueue`] buffers events between notify-ticks. Publishing is synchronous and
//! never runs listener code, so it is safe to publish while holding dispatcher locks.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                       Consumer (one):
//!   add_task/add_worker ──┐
//!   execute-tick        ──┼──► EventQueue ──► notify-tick ──► Registry targets
//!   completions         ──┘    (bounded)      drain()          (per kind, in order)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` takes a short mutex and returns.
//! - **Bounded capacity**: when full, the oldest pending event is dropped.
//! - **FIFO**: `drain()` returns events in publish order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::event::Event;

/// Bounded FIFO of events waiting for the next notify-tick.
///
/// Cheap to clone (internally holds an `Arc`).
#[derive(Clone, Debug)]
pub struct EventQueue {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    pending: Mutex<VecDeque<Event>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl EventQueue {
    /// Creates a new queue; capacity is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(VecDeque::new()),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Enqueues an event for the next notify-tick.
    pub fn publish(&self, ev: Event) {
        let mut pending = self.lock();
        if pending.len() >= self.inner.capacity {
            pending.pop_front();
            let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                capacity = self.inner.capacity,
                dropped,
                "event queue full, dropping oldest pending event"
            );
        }
        pending.push_back(ev);
    }

    /// Takes every pending event, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        self.lock().drain(..).collect()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Events dropped on overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Event>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
