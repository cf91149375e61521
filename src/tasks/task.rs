//! # The work a task executes.
//!
//! This module defines the [`Task`] trait (async unit of work) and [`TaskContext`], the
//! per-run information handed to it. The common handle type is [`TaskRef`], an
//! `Arc<dyn Task>` shared between the caller, the dispatcher and the worker running it.
//!
//! There is no cancellation signal in the context: once started, a task body always
//! runs to completion. A timeout only changes the status recorded for the run.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::ids::TaskId;

/// Shared handle to a unit of work.
pub type TaskRef = Arc<dyn Task>;

/// Information about the current run, passed to [`Task::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskContext {
    /// Id of the task being run.
    pub id: TaskId,
    /// Run number, starting from 1.
    pub attempt: u64,
}

/// # Asynchronous unit of work.
///
/// A `Task` has a stable [`name`](Task::name) and an async [`run`](Task::run) method.
/// The same instance is run again for every repeat, so it must not rely on being
/// called only once; keep per-run state inside the future.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use workvisor::{Task, TaskContext, TaskError};
///
/// struct RefreshStats;
///
/// #[async_trait]
/// impl Task for RefreshStats {
///     fn name(&self) -> &str { "refresh-stats" }
///
///     async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
///         if ctx.attempt > 100 {
///             return Err(TaskError::fail("too many runs"));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes one run of the task.
    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError>;
}
