//! # Worker slots as seen from outside the dispatcher.
//!
//! A worker is an execution slot running at most one task at a time:
//! ```text
//!          assign
//!   Wait ─────────► Busy
//!    ▲                │
//!    └────────────────┘
//!     task body returned
//! ```
//! The execution loop itself lives in the dispatcher core; this module only
//! exposes the status enum and the value snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ids::{TaskId, WorkerId};

/// Status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerStatus {
    /// Idle, eligible for assignment.
    Wait,
    /// Running a task.
    Busy,
}

impl WorkerStatus {
    /// Stable lowercase name, used in logs, metrics labels and metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Wait => "wait",
            WorkerStatus::Busy => "busy",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub created_at: DateTime<Utc>,
    pub status: WorkerStatus,
    /// A locked worker cannot be removed while it is busy.
    pub locked: bool,
    /// Task currently bound to the worker.
    pub task: Option<TaskId>,
}
