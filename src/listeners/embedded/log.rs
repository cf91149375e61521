//! # LogListener: structured event logger
//!
//! A built-in listener that writes every incoming [`Event`] to `tracing`.
//! The component wrapper subscribes it to [`EventKind::ALL`] and locks it.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG workers: worker added worker.id=5f0c…
//! DEBUG workers: task added task.id=91ab… task.name="poll" task.priority=5
//! DEBUG workers: task status changed task.id=91ab… prev=wait current=process
//! ERROR workers: task execution failed task.id=91ab… task.name="poll" error="timed out after 1s"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::listeners::Listen;

/// Name the built-in logging listener registers under.
pub const LOG_LISTENER_NAME: &str = "workers.logging";

/// Event logger listener.
#[derive(Default)]
pub struct LogListener;

impl LogListener {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Listen for LogListener {
    async fn on_event(&self, e: &Event) {
        let task_id = e.task.as_ref().map(|t| t.id.to_string());
        let task_name = e.task.as_ref().map(|t| t.name.as_str());
        let worker_id = e.worker.as_ref().map(|w| w.id.to_string());

        match e.kind {
            EventKind::WorkerAdd | EventKind::WorkerRemove => {
                tracing::debug!(target: "workers", seq = e.seq, worker.id = ?worker_id, "{}", e.kind);
            }
            EventKind::TaskAdd | EventKind::TaskRemove => {
                tracing::debug!(
                    target: "workers",
                    seq = e.seq,
                    task.id = ?task_id,
                    task.name = ?task_name,
                    task.priority = ?e.task.as_ref().map(|t| t.priority),
                    "{}", e.kind
                );
            }
            EventKind::ListenerAdd | EventKind::ListenerRemove => {
                tracing::debug!(
                    target: "workers",
                    seq = e.seq,
                    listener.id = ?e.listener.as_ref().map(|l| l.id.to_string()),
                    listener.name = ?e.listener.as_ref().map(|l| l.name.as_str()),
                    subscription = ?e.subscription.map(|k| k.as_str()),
                    "{}", e.kind
                );
            }
            EventKind::TaskExecuteStart => {
                tracing::debug!(
                    target: "workers",
                    seq = e.seq,
                    task.id = ?task_id,
                    task.name = ?task_name,
                    worker.id = ?worker_id,
                    "{}", e.kind
                );
            }
            EventKind::TaskExecuteStop => match &e.error {
                Some(err) => tracing::error!(
                    target: "workers",
                    seq = e.seq,
                    task.id = ?task_id,
                    task.name = ?task_name,
                    worker.id = ?worker_id,
                    elapsed_ms = ?e.elapsed_ms,
                    error = %err,
                    "task execution failed"
                ),
                None => tracing::debug!(
                    target: "workers",
                    seq = e.seq,
                    task.id = ?task_id,
                    task.name = ?task_name,
                    worker.id = ?worker_id,
                    elapsed_ms = ?e.elapsed_ms,
                    "{}", e.kind
                ),
            },
            EventKind::DispatcherStatusChanged
            | EventKind::WorkerStatusChanged
            | EventKind::TaskStatusChanged => {
                tracing::debug!(
                    target: "workers",
                    seq = e.seq,
                    task.id = ?task_id,
                    worker.id = ?worker_id,
                    prev = ?e.prev.map(|s| s.as_str()),
                    current = ?e.current.map(|s| s.as_str()),
                    "{}", e.kind
                );
            }
        }
    }

    fn name(&self) -> &str {
        LOG_LISTENER_NAME
    }
}
