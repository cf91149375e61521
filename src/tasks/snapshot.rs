use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ids::{TaskId, WorkerId};
use crate::policies::RepeatPolicy;
use crate::tasks::TaskStatus;

/// Point-in-time copy of a task as seen by the dispatcher.
///
/// Returned by introspection calls and carried by task events; holds no
/// reference into dispatcher state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub priority: i64,
    pub repeat: RepeatPolicy,
    #[serde(serialize_with = "millis")]
    pub repeat_interval: Duration,
    #[serde(serialize_with = "opt_millis")]
    pub timeout: Option<Duration>,
    /// Finished runs (including timed-out ones).
    pub attempts: u64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub first_started_at: Option<DateTime<Utc>>,
    pub last_started_at: Option<DateTime<Utc>>,
    /// Start of the run in progress, if any.
    pub started_at: Option<DateTime<Utc>>,
    /// Earliest time the task may be assigned.
    pub allowed_start_at: DateTime<Utc>,
    /// Worker the task is bound to.
    pub worker: Option<WorkerId>,
}

fn millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
}

fn opt_millis<S: serde::Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => millis(d, s),
        None => s.serialize_none(),
    }
}
