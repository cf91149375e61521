//! # Task lifecycle states.
//!
//! ```text
//!            assign              Ok
//!   Wait ───────────► Process ─────────► Success ─┐
//!    ▲                  │  │     Err/panic         │ repeats left
//!    │                  │  └──────────► Fail ──────┤
//!    │                  │     timeout              │
//!    │                  ├─────────────► FailByTimeout
//!    │                  │ worker removed           │
//!    │                  └─────────────► Kill       ▼
//!    └──────────────────────────────────────── RepeatWait
//!                 interval elapsed
//! ```
//!
//! `FailByTimeout` can still move to `Kill` while the timed-out body keeps the worker busy.

use std::fmt;

use serde::Serialize;

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Queued, waiting for an idle worker.
    Wait,
    /// Bound to a worker and running.
    Process,
    /// Last run completed without error.
    Success,
    /// Last run returned an error or panicked.
    Fail,
    /// Last run exceeded its timeout.
    FailByTimeout,
    /// The worker running the task was removed.
    Kill,
    /// Finished a run and waiting out the repeat interval.
    RepeatWait,
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Wait,
        TaskStatus::Process,
        TaskStatus::Success,
        TaskStatus::Fail,
        TaskStatus::FailByTimeout,
        TaskStatus::Kill,
        TaskStatus::RepeatWait,
    ];

    /// Stable lowercase name, used in logs, metrics labels and metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Wait => "wait",
            TaskStatus::Process => "process",
            TaskStatus::Success => "success",
            TaskStatus::Fail => "fail",
            TaskStatus::FailByTimeout => "fail-by-timeout",
            TaskStatus::Kill => "kill",
            TaskStatus::RepeatWait => "repeat-wait",
        }
    }

    /// `true` for statuses that end a run.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Fail | TaskStatus::FailByTimeout | TaskStatus::Kill
        )
    }

    /// `true` for statuses of a queued task (not bound to any worker).
    pub fn is_waiting(&self) -> bool {
        matches!(self, TaskStatus::Wait | TaskStatus::RepeatWait)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition(self, next: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, next),
            (Wait, Process)
                | (Process, Success | Fail | FailByTimeout | Kill)
                | (FailByTimeout, Kill)
                | (Success | Fail | FailByTimeout, RepeatWait)
                | (RepeatWait, Wait)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
