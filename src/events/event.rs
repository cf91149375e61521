//! # Lifecycle events published by the dispatcher.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Registry events**: workers, tasks and listeners added or removed
//! - **Execution events**: a task run started or stopped
//! - **Status events**: a dispatcher, worker or task changed [`Status`]
//!
//! The [`Event`] struct carries snapshots of the involved entities, so listeners
//! never need to call back into the dispatcher to learn what happened.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Events are delivered in publish order.
//!
//! ## Example
//! ```rust
//! use workvisor::{Event, EventKind, Status, TaskStatus};
//!
//! let ev = Event::new(EventKind::TaskStatusChanged)
//!     .with_status(Status::Task(TaskStatus::Wait), Status::Task(TaskStatus::Process));
//!
//! assert_eq!(ev.kind, EventKind::TaskStatusChanged);
//! assert_eq!(ev.current, Some(Status::Task(TaskStatus::Process)));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::DispatcherStatus;
use crate::listeners::ListenerSnapshot;
use crate::tasks::{TaskSnapshot, TaskStatus};
use crate::workers::{WorkerSnapshot, WorkerStatus};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // === Registry events ===
    /// A worker was created.
    ///
    /// Sets: `worker`
    WorkerAdd,

    /// A worker was removed (its in-flight run, if any, keeps going).
    ///
    /// Sets: `worker`
    WorkerRemove,

    /// A task was submitted.
    ///
    /// Sets: `task`
    TaskAdd,

    /// A task was removed, explicitly or by eviction from the finished history.
    ///
    /// Sets: `task`
    TaskRemove,

    /// A listener was subscribed to a kind.
    ///
    /// Sets: `listener`, `subscription`
    ListenerAdd,

    /// A listener was unsubscribed from a kind.
    ///
    /// Sets: `listener`, `subscription`
    ListenerRemove,

    // === Execution events ===
    /// A task run started on a worker.
    ///
    /// Sets: `task`, `worker`
    TaskExecuteStart,

    /// A task run stopped (or timed out).
    ///
    /// Sets: `task`, `worker`, `elapsed_ms`, `error` (on failure)
    TaskExecuteStop,

    // === Status events ===
    /// The dispatcher moved between Wait/Process/Cancel.
    ///
    /// Sets: `prev`, `current`
    DispatcherStatusChanged,

    /// A worker moved between Wait/Busy.
    ///
    /// Sets: `worker`, `prev`, `current`
    WorkerStatusChanged,

    /// A task changed status.
    ///
    /// Sets: `task`, `prev`, `current`
    TaskStatusChanged,
}

impl EventKind {
    /// All kinds; subscribe to this to observe everything.
    pub const ALL: [EventKind; 11] = [
        EventKind::WorkerAdd,
        EventKind::WorkerRemove,
        EventKind::TaskAdd,
        EventKind::TaskRemove,
        EventKind::ListenerAdd,
        EventKind::ListenerRemove,
        EventKind::TaskExecuteStart,
        EventKind::TaskExecuteStop,
        EventKind::DispatcherStatusChanged,
        EventKind::WorkerStatusChanged,
        EventKind::TaskStatusChanged,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::WorkerAdd => "worker_add",
            EventKind::WorkerRemove => "worker_remove",
            EventKind::TaskAdd => "task_add",
            EventKind::TaskRemove => "task_remove",
            EventKind::ListenerAdd => "listener_add",
            EventKind::ListenerRemove => "listener_remove",
            EventKind::TaskExecuteStart => "task_execute_start",
            EventKind::TaskExecuteStop => "task_execute_stop",
            EventKind::DispatcherStatusChanged => "dispatcher_status_changed",
            EventKind::WorkerStatusChanged => "worker_status_changed",
            EventKind::TaskStatusChanged => "task_status_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status carried by status-changed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", content = "status", rename_all = "snake_case")]
pub enum Status {
    Dispatcher(DispatcherStatus),
    Worker(WorkerStatus),
    Task(TaskStatus),
}

impl Status {
    /// Lowercase name of the wrapped status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Dispatcher(s) => s.as_str(),
            Status::Worker(s) => s.as_str(),
            Status::Task(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle event with optional payload.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: DateTime<Utc>,
    /// Event classification.
    pub kind: EventKind,

    /// Involved task.
    pub task: Option<TaskSnapshot>,
    /// Involved worker.
    pub worker: Option<WorkerSnapshot>,
    /// Involved listener.
    pub listener: Option<ListenerSnapshot>,
    /// Kind a listener was (un)subscribed for.
    pub subscription: Option<EventKind>,

    /// Previous status (status-changed events).
    pub prev: Option<Status>,
    /// Current status (status-changed events).
    pub current: Option<Status>,

    /// Failure message of a stopped run.
    pub error: Option<String>,
    /// Duration of a stopped run in milliseconds.
    pub elapsed_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: Utc::now(),
            kind,
            task: None,
            worker: None,
            listener: None,
            subscription: None,
            prev: None,
            current: None,
            error: None,
            elapsed_ms: None,
        }
    }

    /// Attaches a task snapshot.
    #[inline]
    pub fn with_task(mut self, task: TaskSnapshot) -> Self {
        self.task = Some(task);
        self
    }

    /// Attaches a worker snapshot.
    #[inline]
    pub fn with_worker(mut self, worker: WorkerSnapshot) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches a listener snapshot and the kind it was (un)subscribed for.
    #[inline]
    pub fn with_listener(mut self, listener: ListenerSnapshot, kind: EventKind) -> Self {
        self.listener = Some(listener);
        self.subscription = Some(kind);
        self
    }

    /// Attaches a status transition.
    #[inline]
    pub fn with_status(mut self, prev: Status, current: Status) -> Self {
        self.prev = Some(prev);
        self.current = Some(current);
        self
    }

    /// Attaches a failure message.
    #[inline]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a run duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Current task status carried by a `TaskStatusChanged` event.
    pub fn task_status(&self) -> Option<(TaskStatus, TaskStatus)> {
        match (self.prev, self.current) {
            (Some(Status::Task(prev)), Some(Status::Task(cur))) => Some((prev, cur)),
            _ => None,
        }
    }

    /// Current worker status carried by a `WorkerStatusChanged` event.
    pub fn worker_status(&self) -> Option<(WorkerStatus, WorkerStatus)> {
        match (self.prev, self.current) {
            (Some(Status::Worker(prev)), Some(Status::Worker(cur))) => Some((prev, cur)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::TaskAdd);
        let b = Event::new(EventKind::TaskAdd);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_status_accessors() {
        let ev = Event::new(EventKind::WorkerStatusChanged)
            .with_status(Status::Worker(WorkerStatus::Wait), Status::Worker(WorkerStatus::Busy));
        assert_eq!(ev.worker_status(), Some((WorkerStatus::Wait, WorkerStatus::Busy)));
        assert_eq!(ev.task_status(), None);
    }

    #[test]
    fn test_elapsed_and_error() {
        let ev = Event::new(EventKind::TaskExecuteStop)
            .with_elapsed(Duration::from_millis(1500))
            .with_error("boom");
        assert_eq!(ev.elapsed_ms, Some(1500));
        assert_eq!(ev.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_all_kinds_are_distinct() {
        let mut names: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }
}
