//! # Worker execution loop and single-run execution.
//!
//! Each worker is one tokio task running [`work`]: it waits on its assignment channel,
//! executes one task run at a time via [`run_once`], and reports the outcome to the
//! dispatcher through the completion channel.
//!
//! ## Event flow
//!
//! ```text
//! Success / failure / panic:
//!   task.run() → Ok/Err/panic → send Finished(result)
//!
//! Timeout:
//!   timer fires first → send TimedOut      (dispatcher records FailByTimeout)
//!                     → keep awaiting body  (worker stays busy)
//!                     → body returns → send Released (late result discarded)
//! ```
//!
//! ## Rules
//! - Sends **exactly one** of `Finished` or `TimedOut` per run, and `Released` only after `TimedOut`.
//! - The body is never dropped or interrupted; timeout is bookkeeping only.
//! - Panics inside the body are caught and reported as [`TaskError::Panicked`].
//! - The loop exits once the assignment channel is closed (worker removed or shutdown),
//!   after finishing the run in progress.

use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::error::{TaskError, panic_message};
use crate::ids::{TaskId, WorkerId};
use crate::tasks::{TaskContext, TaskRef};

/// One task run handed to a worker.
pub(crate) struct Assignment {
    pub(crate) task_id: TaskId,
    pub(crate) task: TaskRef,
    pub(crate) timeout: Option<Duration>,
    pub(crate) attempt: u64,
}

/// Outcome of a run as reported to the dispatcher.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The body returned (or panicked) within its timeout.
    Finished(Result<(), TaskError>),
    /// The timeout elapsed; the body is still running.
    TimedOut(Duration),
    /// A timed-out body finally returned; its result is discarded.
    Released,
}

/// Completion signal sent from a worker to the dispatcher loop.
#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) worker: WorkerId,
    pub(crate) task: TaskId,
    pub(crate) outcome: Outcome,
    pub(crate) elapsed: Duration,
}

/// Runs a worker until its assignment channel is closed.
pub(crate) async fn work(
    worker: WorkerId,
    mut rx: mpsc::Receiver<Assignment>,
    done: mpsc::UnboundedSender<Completion>,
) {
    while let Some(assignment) = rx.recv().await {
        run_once(worker, assignment, &done).await;
    }
    tracing::trace!(worker.id = %worker, "worker loop exited");
}

/// Executes a single run of an assigned task.
///
/// ### Timeout behavior
/// If `timeout` is `Some(dur)`, the body races a `sleep(dur)`:
/// - body first: `Finished` is sent
/// - timer first: `TimedOut` is sent, the body is still awaited, then `Released` is sent
async fn run_once(worker: WorkerId, a: Assignment, done: &mpsc::UnboundedSender<Completion>) {
    let started = Instant::now();
    let task_id = a.task_id;
    let ctx = TaskContext {
        id: task_id,
        attempt: a.attempt,
    };

    let body = std::panic::AssertUnwindSafe(a.task.run(ctx))
        .catch_unwind()
        .map(|res| match res {
            Ok(r) => r,
            Err(payload) => Err(TaskError::Panicked {
                info: panic_message(payload.as_ref()),
            }),
        });
    tokio::pin!(body);

    let send = |outcome: Outcome| {
        // The receiver only goes away together with the dispatcher.
        let _ = done.send(Completion {
            worker,
            task: task_id,
            outcome,
            elapsed: started.elapsed(),
        });
    };

    let Some(limit) = a.timeout else {
        let res = body.await;
        send(Outcome::Finished(res));
        return;
    };

    tokio::select! {
        biased;
        res = &mut body => send(Outcome::Finished(res)),
        _ = time::sleep(limit) => {
            tracing::warn!(
                task.id = %task_id,
                task.name = a.task.name(),
                worker.id = %worker,
                timeout_ms = limit.as_millis() as u64,
                "task exceeded its timeout, still running"
            );
            send(Outcome::TimedOut(limit));
            let _late = (&mut body).await;
            send(Outcome::Released);
        }
    }
}
