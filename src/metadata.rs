//! # Metadata maps for dashboards.
//!
//! Each snapshot renders into a flat [`Metadata`] map keyed by the constants in
//! [`keys`]. Timestamps are RFC 3339 strings, durations are milliseconds, and
//! absent values are `null`.
//!
//! ```rust
//! use workvisor::metadata::keys;
//! # use workvisor::{Config, Dispatcher};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = Dispatcher::new(Config::default());
//! let id = dispatcher.add_worker().await;
//!
//! let meta = dispatcher.worker_metadata(id).await.unwrap();
//! assert_eq!(meta[keys::STATUS], "wait");
//! assert_eq!(meta[keys::LOCKED], false);
//! # }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::listeners::ListenerSnapshot;
use crate::tasks::TaskSnapshot;
use crate::workers::WorkerSnapshot;

/// Point-in-time field map of one entity.
pub type Metadata = BTreeMap<&'static str, Value>;

/// Well-known metadata keys.
pub mod keys {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const STATUS: &str = "status";
    pub const LOCKED: &str = "locked";
    pub const CREATED_AT: &str = "created_at";

    // worker
    pub const TASK: &str = "task";

    // task
    pub const WORKER: &str = "worker";
    pub const PRIORITY: &str = "priority";
    pub const REPEAT: &str = "repeat";
    pub const REPEAT_INTERVAL_MS: &str = "repeat_interval_ms";
    pub const TIMEOUT_MS: &str = "timeout_ms";
    pub const ATTEMPTS: &str = "attempts";
    pub const LAST_ERROR: &str = "last_error";
    pub const FIRST_STARTED_AT: &str = "first_started_at";
    pub const LAST_STARTED_AT: &str = "last_started_at";
    pub const STARTED_AT: &str = "started_at";
    pub const ALLOWED_START_AT: &str = "allowed_start_at";

    // listener
    pub const EVENTS: &str = "events";
    pub const FIRES: &str = "fires";
    pub const FAILURES: &str = "failures";
    pub const FIRST_FIRED_AT: &str = "first_fired_at";
    pub const LAST_FIRED_AT: &str = "last_fired_at";
}

fn time(t: DateTime<Utc>) -> Value {
    Value::String(t.to_rfc3339())
}

fn opt_time(t: Option<DateTime<Utc>>) -> Value {
    t.map(time).unwrap_or(Value::Null)
}

fn millis(d: Duration) -> Value {
    Value::from(d.as_millis().min(u128::from(u64::MAX)) as u64)
}

impl WorkerSnapshot {
    /// Renders the snapshot as a metadata map.
    pub fn metadata(&self) -> Metadata {
        Metadata::from([
            (keys::ID, Value::String(self.id.to_string())),
            (keys::CREATED_AT, time(self.created_at)),
            (keys::STATUS, Value::from(self.status.as_str())),
            (keys::LOCKED, Value::Bool(self.locked)),
            (
                keys::TASK,
                self.task
                    .map(|t| Value::String(t.to_string()))
                    .unwrap_or(Value::Null),
            ),
        ])
    }
}

impl TaskSnapshot {
    /// Renders the snapshot as a metadata map.
    pub fn metadata(&self) -> Metadata {
        Metadata::from([
            (keys::ID, Value::String(self.id.to_string())),
            (keys::NAME, Value::String(self.name.clone())),
            (keys::STATUS, Value::from(self.status.as_str())),
            (keys::PRIORITY, Value::from(self.priority)),
            (
                keys::REPEAT,
                serde_json::to_value(self.repeat).unwrap_or(Value::Null),
            ),
            (keys::REPEAT_INTERVAL_MS, millis(self.repeat_interval)),
            (
                keys::TIMEOUT_MS,
                self.timeout.map(millis).unwrap_or(Value::Null),
            ),
            (keys::ATTEMPTS, Value::from(self.attempts)),
            (
                keys::LAST_ERROR,
                self.last_error
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            (keys::CREATED_AT, time(self.created_at)),
            (keys::FIRST_STARTED_AT, opt_time(self.first_started_at)),
            (keys::LAST_STARTED_AT, opt_time(self.last_started_at)),
            (keys::STARTED_AT, opt_time(self.started_at)),
            (keys::ALLOWED_START_AT, time(self.allowed_start_at)),
            (
                keys::WORKER,
                self.worker
                    .map(|w| Value::String(w.to_string()))
                    .unwrap_or(Value::Null),
            ),
        ])
    }
}

impl ListenerSnapshot {
    /// Renders the snapshot as a metadata map.
    pub fn metadata(&self) -> Metadata {
        Metadata::from([
            (keys::ID, Value::String(self.id.to_string())),
            (keys::NAME, Value::String(self.name.clone())),
            (keys::CREATED_AT, time(self.created_at)),
            (
                keys::EVENTS,
                Value::Array(self.events.iter().map(|k| Value::from(k.as_str())).collect()),
            ),
            (keys::LOCKED, Value::Bool(self.locked)),
            (keys::FIRES, Value::from(self.fires)),
            (keys::FAILURES, Value::from(self.failures)),
            (keys::FIRST_FIRED_AT, opt_time(self.first_fired_at)),
            (keys::LAST_FIRED_AT, opt_time(self.last_fired_at)),
        ])
    }
}
