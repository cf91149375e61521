//! # Task collection: waiting, in-flight and recently finished tasks.
//!
//! [`TaskQueue`] keeps every known task keyed by id plus a bounded history of
//! finished ones. Selection is computed on demand:
//!
//! ```text
//! eligible(now) = { Wait, allowed_at <= now }  sorted by  (priority desc, seq asc)
//! ```
//!
//! `seq` is the submission order, so equal priorities run FIFO.

use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::ids::{TaskId, WorkerId};
use crate::tasks::{TaskSnapshot, TaskSpec, TaskStatus};

pub(crate) struct TaskState {
    pub(crate) id: TaskId,
    pub(crate) spec: TaskSpec,
    seq: u64,
    status: TaskStatus,
    pub(crate) attempts: u64,
    pub(crate) last_error: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) first_started_at: Option<DateTime<Utc>>,
    pub(crate) last_started_at: Option<DateTime<Utc>>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    /// Scheduling clock; `allowed_start_at` mirrors it for display.
    pub(crate) allowed_at: Instant,
    pub(crate) allowed_start_at: DateTime<Utc>,
    pub(crate) worker: Option<WorkerId>,
}

impl TaskState {
    pub(crate) fn status(&self) -> TaskStatus {
        self.status
    }

    /// Moves the task to `next`, returning the previous status.
    pub(crate) fn set_status(&mut self, next: TaskStatus) -> TaskStatus {
        debug_assert!(
            self.status.can_transition(next),
            "illegal task transition {} -> {}",
            self.status,
            next
        );
        std::mem::replace(&mut self.status, next)
    }

    /// Earliest start becomes `now + delay`.
    pub(crate) fn allow_after(&mut self, now: Instant, delay: std::time::Duration) {
        self.allowed_at = now + delay;
        self.allowed_start_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            name: self.spec.name().to_string(),
            status: self.status,
            priority: self.spec.priority(),
            repeat: self.spec.repeat(),
            repeat_interval: self.spec.repeat_interval(),
            timeout: self.spec.timeout(),
            attempts: self.attempts,
            last_error: self.last_error.clone(),
            created_at: self.created_at,
            first_started_at: self.first_started_at,
            last_started_at: self.last_started_at,
            started_at: self.started_at,
            allowed_start_at: self.allowed_start_at,
            worker: self.worker,
        }
    }
}

pub(crate) struct TaskQueue {
    tasks: HashMap<TaskId, TaskState>,
    next_seq: u64,
    /// Finished task ids, oldest first.
    finished: VecDeque<TaskId>,
    capacity: usize,
}

impl TaskQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            tasks: HashMap::new(),
            next_seq: 0,
            finished: VecDeque::new(),
            capacity,
        }
    }

    /// Registers a new task in `Wait`.
    pub(crate) fn insert(&mut self, spec: TaskSpec, now: Instant) -> &TaskState {
        let id = TaskId::new();
        let seq = self.next_seq;
        self.next_seq += 1;

        let delay = spec.delay();
        let mut state = TaskState {
            id,
            spec,
            seq,
            status: TaskStatus::Wait,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            first_started_at: None,
            last_started_at: None,
            started_at: None,
            allowed_at: now,
            allowed_start_at: Utc::now(),
            worker: None,
        };
        state.allow_after(now, delay);
        self.tasks.entry(id).or_insert(state)
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&TaskState> {
        self.tasks.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskState> {
        self.tasks.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<TaskState> {
        let state = self.tasks.remove(&id)?;
        self.finished.retain(|f| *f != id);
        Some(state)
    }

    /// Moves every due `RepeatWait` task back to `Wait`; returns their snapshots.
    pub(crate) fn promote_due(&mut self, now: Instant) -> Vec<TaskSnapshot> {
        let mut promoted: Vec<&mut TaskState> = self
            .tasks
            .values_mut()
            .filter(|t| t.status == TaskStatus::RepeatWait && t.allowed_at <= now)
            .collect();
        promoted.sort_by_key(|t| t.seq);
        promoted
            .into_iter()
            .map(|t| {
                t.set_status(TaskStatus::Wait);
                t.snapshot()
            })
            .collect()
    }

    /// Tasks ready for assignment, best first.
    pub(crate) fn eligible(&self, now: Instant) -> Vec<TaskId> {
        let mut ready: Vec<&TaskState> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Wait && t.worker.is_none() && t.allowed_at <= now)
            .collect();
        ready.sort_by_key(|t| (Reverse(t.spec.priority()), t.seq));
        ready.into_iter().map(|t| t.id).collect()
    }

    /// Records a terminal task in the history, evicting the oldest beyond capacity.
    ///
    /// Returns the evicted tasks.
    pub(crate) fn mark_finished(&mut self, id: TaskId) -> Vec<TaskState> {
        if !self.finished.contains(&id) {
            self.finished.push_back(id);
        }
        let mut evicted = Vec::new();
        while self.finished.len() > self.capacity {
            let Some(old) = self.finished.pop_front() else { break };
            if let Some(state) = self.tasks.remove(&old) {
                evicted.push(state);
            }
        }
        evicted
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Count of tasks per status, every status included.
    pub(crate) fn status_counts(&self) -> Vec<(TaskStatus, usize)> {
        TaskStatus::ALL
            .iter()
            .map(|s| (*s, self.tasks.values().filter(|t| t.status == *s).count()))
            .collect()
    }

    /// Snapshots in submission order.
    pub(crate) fn snapshots(&self) -> Vec<TaskSnapshot> {
        let mut all: Vec<&TaskState> = self.tasks.values().collect();
        all.sort_by_key(|t| t.seq);
        all.into_iter().map(TaskState::snapshot).collect()
    }
}
