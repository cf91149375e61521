//! # Execute-tick, completion handling and notify-tick.
//!
//! ## Completion flow
//! ```text
//! Finished(Ok)   → Process → Success       ┐
//! Finished(Err)  → Process → Fail          ├─► repeats left? → RepeatWait (allowed = now + interval)
//! TimedOut       → Process → FailByTimeout ┘    (on Released for timeouts)
//!                  worker stays Busy until Released
//! Released       → late result discarded
//! then           → worker Busy → Wait
//! unknown worker → orphaned, discarded
//! ```

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::error::TaskError;
use crate::events::{Event, EventKind, Status};
use crate::ids::TaskId;
use crate::listeners::deliver;
use crate::tasks::{TaskSnapshot, TaskStatus};
use crate::workers::{WorkerSnapshot, WorkerStatus};

use super::dispatcher::Dispatcher;
use super::pool::WorkerSlot;
use super::queue::TaskQueue;
use super::runner::{Assignment, Completion, Outcome};

impl Dispatcher {
    /// Promotes due repeats and assigns eligible tasks to idle workers.
    pub(super) async fn execute_tasks(&self) {
        let now = Instant::now();
        let mut workers = self.workers.write().await;
        let mut tasks = self.tasks.write().await;

        for snapshot in tasks.promote_due(now) {
            self.publish_task_status(snapshot, TaskStatus::RepeatWait, TaskStatus::Wait);
        }

        let idle = workers.idle_ids();
        if idle.is_empty() {
            return;
        }
        let mut eligible = tasks.eligible(now).into_iter().peekable();

        for worker_id in idle {
            let Some(&task_id) = eligible.peek() else { break };
            let Some(slot) = workers.get_mut(worker_id) else { continue };
            let Some(task) = tasks.get_mut(task_id) else {
                eligible.next();
                continue;
            };

            let assignment = Assignment {
                task_id,
                task: task.spec.task().clone(),
                timeout: task.spec.timeout(),
                attempt: task.attempts + 1,
            };
            let sent = slot
                .tx
                .as_ref()
                .map(|tx| tx.try_send(assignment).is_ok())
                .unwrap_or(false);
            if !sent {
                // the task stays at the head for the next idle worker
                tracing::warn!(worker.id = %worker_id, "worker rejected assignment");
                continue;
            }
            eligible.next();

            let started = Utc::now();
            let prev = task.set_status(TaskStatus::Process);
            task.worker = Some(worker_id);
            task.started_at = Some(started);
            task.last_started_at = Some(started);
            task.first_started_at.get_or_insert(started);

            slot.task = Some(task_id);
            let worker_prev = slot.set_status(WorkerStatus::Busy);

            tracing::debug!(
                task.id = %task_id,
                task.name = task.spec.name(),
                worker.id = %worker_id,
                attempt = task.attempts + 1,
                "task assigned"
            );

            let task_snapshot = task.snapshot();
            let worker_snapshot = slot.snapshot();
            self.events.publish(
                Event::new(EventKind::TaskExecuteStart)
                    .with_task(task_snapshot.clone())
                    .with_worker(worker_snapshot.clone()),
            );
            self.publish_worker_status(worker_snapshot, worker_prev, WorkerStatus::Busy);
            self.publish_task_status(task_snapshot, prev, TaskStatus::Process);
        }
    }

    /// Applies a worker's completion signal.
    pub(super) async fn complete(&self, c: Completion) {
        let Completion {
            worker,
            task,
            outcome,
            elapsed,
        } = c;

        let mut workers = self.workers.write().await;
        let Some(slot) = workers
            .get_mut(worker)
            .filter(|s| s.task == Some(task))
        else {
            tracing::warn!(
                worker.id = %worker,
                task.id = %task,
                elapsed_ms = elapsed.as_millis() as u64,
                "discarding orphaned completion"
            );
            return;
        };
        let mut tasks = self.tasks.write().await;

        match outcome {
            Outcome::Finished(result) => {
                let next = if result.is_ok() {
                    TaskStatus::Success
                } else {
                    TaskStatus::Fail
                };
                self.finish_run(&mut tasks, slot, task, next, result.err(), elapsed);
                self.schedule_next(&mut tasks, task);
                self.release_worker(slot);
            }
            Outcome::TimedOut(limit) => {
                self.finish_run(
                    &mut tasks,
                    slot,
                    task,
                    TaskStatus::FailByTimeout,
                    Some(TaskError::Timeout { timeout: limit }),
                    elapsed,
                );
            }
            Outcome::Released => {
                tracing::debug!(
                    task.id = %task,
                    worker.id = %worker,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "timed-out task returned, result discarded"
                );
                if let Some(state) = tasks.get_mut(task) {
                    state.worker = None;
                    state.started_at = None;
                }
                if tasks.get(task).map(|t| t.status()) == Some(TaskStatus::FailByTimeout) {
                    self.schedule_next(&mut tasks, task);
                }
                self.release_worker(slot);
            }
        }
    }

    /// Records the end of a run: attempts, last error, status, stop event.
    ///
    /// A successful or failed run also unbinds the task; a timed-out one stays
    /// bound until the body returns.
    fn finish_run(
        &self,
        tasks: &mut TaskQueue,
        slot: &WorkerSlot,
        id: TaskId,
        next: TaskStatus,
        error: Option<TaskError>,
        elapsed: Duration,
    ) {
        let Some(task) = tasks.get_mut(id) else { return };

        task.attempts += 1;
        if next != TaskStatus::FailByTimeout {
            task.worker = None;
            task.started_at = None;
        }
        let message = error.as_ref().map(ToString::to_string);
        if let Some(err) = &error {
            tracing::debug!(
                task.id = %id,
                task.name = task.spec.name(),
                error.label = err.as_label(),
                error = %err,
                "task run failed"
            );
            task.last_error = message.clone();
        }
        let prev = task.set_status(next);

        let snapshot = task.snapshot();
        let mut stop = Event::new(EventKind::TaskExecuteStop)
            .with_task(snapshot.clone())
            .with_worker(slot.snapshot())
            .with_elapsed(elapsed);
        if let Some(message) = message {
            stop = stop.with_error(message);
        }
        self.events.publish(stop);
        self.publish_task_status(snapshot, prev, next);
    }

    /// Schedules the next run of a finished task, or files it into history.
    fn schedule_next(&self, tasks: &mut TaskQueue, id: TaskId) {
        let Some(task) = tasks.get_mut(id) else { return };
        if task.spec.repeat().allows_another(task.attempts) {
            let interval = task.spec.repeat_interval();
            task.allow_after(Instant::now(), interval);
            let prev = task.set_status(TaskStatus::RepeatWait);
            let snapshot = task.snapshot();
            self.publish_task_status(snapshot, prev, TaskStatus::RepeatWait);
            return;
        }
        for evicted in tasks.mark_finished(id) {
            tracing::trace!(task.id = %evicted.id, "finished task evicted from history");
            self.events
                .publish(Event::new(EventKind::TaskRemove).with_task(evicted.snapshot()));
        }
    }

    fn release_worker(&self, slot: &mut WorkerSlot) {
        slot.task = None;
        let prev = slot.set_status(WorkerStatus::Wait);
        self.publish_worker_status(slot.snapshot(), prev, WorkerStatus::Wait);
    }

    /// Delivers every pending event to its listeners.
    pub(super) async fn notify_listeners(&self) {
        for event in self.events.drain() {
            let targets = self.listeners.read().await.targets(event.kind);
            if !targets.is_empty() {
                deliver(&targets, &event).await;
            }
        }
    }

    pub(super) fn publish_task_status(&self, snapshot: TaskSnapshot, prev: TaskStatus, next: TaskStatus) {
        self.events.publish(
            Event::new(EventKind::TaskStatusChanged)
                .with_task(snapshot)
                .with_status(Status::Task(prev), Status::Task(next)),
        );
    }

    fn publish_worker_status(&self, snapshot: WorkerSnapshot, prev: WorkerStatus, next: WorkerStatus) {
        self.events.publish(
            Event::new(EventKind::WorkerStatusChanged)
                .with_worker(snapshot)
                .with_status(Status::Worker(prev), Status::Worker(next)),
        );
    }
}
