//! # Read-only views of dispatcher state.
//!
//! Every call takes read locks only and returns owned copies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ids::{ListenerId, TaskId, WorkerId};
use crate::listeners::ListenerSnapshot;
use crate::metadata::Metadata;
use crate::tasks::TaskSnapshot;
use crate::workers::{WorkerSnapshot, WorkerStatus};

use super::dispatcher::{Dispatcher, DispatcherStatus};

/// Aggregate counters over the dispatcher's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub status: DispatcherStatus,
    pub workers_total: usize,
    pub workers_wait: usize,
    pub workers_busy: usize,
    pub tasks_total: usize,
    /// Task count per status name; every status is present.
    pub tasks_by_status: BTreeMap<&'static str, usize>,
    pub listeners_total: usize,
    /// Number of (listener, kind) subscriptions.
    pub listener_bindings: usize,
    pub pending_events: usize,
    pub dropped_events: u64,
}

impl Dispatcher {
    /// Current dispatcher status.
    pub async fn status(&self) -> DispatcherStatus {
        *self.status.read().await
    }

    /// Workers in creation order.
    pub async fn workers(&self) -> Vec<WorkerSnapshot> {
        self.workers.read().await.snapshots()
    }

    /// Tasks (waiting, running and recently finished) in submission order.
    pub async fn tasks(&self) -> Vec<TaskSnapshot> {
        self.tasks.read().await.snapshots()
    }

    /// Listeners in registration order.
    pub async fn listeners(&self) -> Vec<ListenerSnapshot> {
        let locked = self.locked_listeners.read().await;
        self.listeners.read().await.snapshots(&locked)
    }

    pub async fn worker(&self, id: WorkerId) -> Option<WorkerSnapshot> {
        self.workers.read().await.get(id).map(|w| w.snapshot())
    }

    pub async fn task(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks.read().await.get(id).map(|t| t.snapshot())
    }

    pub async fn listener(&self, id: ListenerId) -> Option<ListenerSnapshot> {
        let locked = self.locked_listeners.read().await;
        self.listeners.read().await.snapshot(id, &locked)
    }

    /// Metadata map of a worker, `None` if unknown.
    pub async fn worker_metadata(&self, id: WorkerId) -> Option<Metadata> {
        self.worker(id).await.map(|w| w.metadata())
    }

    /// Metadata map of a task, `None` if unknown.
    pub async fn task_metadata(&self, id: TaskId) -> Option<Metadata> {
        self.task(id).await.map(|t| t.metadata())
    }

    /// Metadata map of a listener, `None` if unknown.
    pub async fn listener_metadata(&self, id: ListenerId) -> Option<Metadata> {
        self.listener(id).await.map(|l| l.metadata())
    }

    /// Aggregate counters.
    pub async fn stats(&self) -> DispatcherStats {
        let status = self.status().await;
        let (workers_total, workers_wait, workers_busy) = {
            let workers = self.workers.read().await;
            (
                workers.len(),
                workers.count(WorkerStatus::Wait),
                workers.count(WorkerStatus::Busy),
            )
        };
        let (tasks_total, tasks_by_status) = {
            let tasks = self.tasks.read().await;
            let by_status = tasks
                .status_counts()
                .into_iter()
                .map(|(s, n)| (s.as_str(), n))
                .collect();
            (tasks.len(), by_status)
        };
        let (listeners_total, listener_bindings) = {
            let registry = self.listeners.read().await;
            (registry.len(), registry.bindings())
        };

        DispatcherStats {
            status,
            workers_total,
            workers_wait,
            workers_busy,
            tasks_total,
            tasks_by_status,
            listeners_total,
            listener_bindings,
            pending_events: self.events.len(),
            dropped_events: self.events.dropped(),
        }
    }
}
