//! # Metrics export via the `metrics` facade.
//!
//! - [`MetricsListener`] counts status transitions as they are delivered.
//! - [`MetricsCollector`] sets point-in-time gauges from [`Dispatcher::stats`].
//!
//! Both only record through the facade; installing an exporter
//! (e.g. `metrics-exporter-prometheus`) is up to the application.
//!
//! | metric                           | type    | labels   |
//! |----------------------------------|---------|----------|
//! | `workers_worker_status_total`    | counter | `status` |
//! | `workers_task_status_total`      | counter | `status` |
//! | `workers_workers_total`          | gauge   |          |
//! | `workers_tasks_total`            | gauge   |          |
//! | `workers_listeners_total`        | gauge   |          |
//! | `workers_listeners_events_total` | gauge   |          |

use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, gauge};

use crate::core::Dispatcher;
use crate::events::{Event, EventKind, Status};
use crate::listeners::Listen;

/// Name the built-in metrics listener registers under.
pub const METRICS_LISTENER_NAME: &str = "workers.metrics";

/// Kinds the metrics listener subscribes to.
pub const METRICS_LISTENER_EVENTS: [EventKind; 2] =
    [EventKind::WorkerStatusChanged, EventKind::TaskStatusChanged];

/// Counts worker and task status transitions.
#[derive(Default)]
pub struct MetricsListener;

impl MetricsListener {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Listen for MetricsListener {
    async fn on_event(&self, e: &Event) {
        match e.current {
            Some(Status::Worker(status)) => {
                counter!("workers_worker_status_total", "status" => status.as_str()).increment(1);
            }
            Some(Status::Task(status)) => {
                counter!("workers_task_status_total", "status" => status.as_str()).increment(1);
            }
            _ => {}
        }
    }

    fn name(&self) -> &str {
        METRICS_LISTENER_NAME
    }
}

/// Gauge updater bound to one dispatcher.
///
/// Call [`collect`](Self::collect) from a scrape hook or a periodic task.
#[derive(Clone)]
pub struct MetricsCollector {
    dispatcher: Arc<Dispatcher>,
}

impl MetricsCollector {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Reads dispatcher stats and sets the gauges.
    pub async fn collect(&self) {
        let stats = self.dispatcher.stats().await;
        gauge!("workers_workers_total").set(stats.workers_total as f64);
        gauge!("workers_tasks_total").set(stats.tasks_total as f64);
        gauge!("workers_listeners_total").set(stats.listeners_total as f64);
        gauge!("workers_listeners_events_total").set(stats.listener_bindings as f64);
    }
}
