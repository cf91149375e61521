//! Error types used by the dispatcher and by task executions.
//!
//! This module defines two main error enums:
//!
//! - [`DispatcherError`]: misuse of the dispatcher API, returned synchronously to the caller.
//! - [`TaskError`]: failures of individual task executions, recorded on the task.
//!
//! Both types provide `as_label` for logs/metrics. Nothing here is fatal to the process:
//! task errors only drive status transitions and dispatcher errors are plain rejections.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

use crate::core::DispatcherStatus;
use crate::events::EventKind;
use crate::ids::{ListenerId, TaskId, WorkerId};

/// # Errors returned by dispatcher operations.
///
/// These are rejections of a single request; the dispatcher state is left unchanged.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatcherError {
    /// The listener is in the locked set (built-in logging/metrics) and cannot be removed.
    #[error("listener {id} is protected and cannot be removed")]
    ProtectedListener {
        /// Id of the protected listener.
        id: ListenerId,
    },

    /// The task is bound to a worker; let it finish or remove the worker.
    #[error("task {id} is in execution")]
    TaskInExecution {
        /// Id of the executing task.
        id: TaskId,
    },

    /// No task with this id is known to the dispatcher.
    #[error("task {id} not found")]
    TaskNotFound {
        /// Requested id.
        id: TaskId,
    },

    /// No worker with this id is known to the dispatcher.
    #[error("worker {id} not found")]
    WorkerNotFound {
        /// Requested id.
        id: WorkerId,
    },

    /// The worker is locked and currently executing a task.
    #[error("worker {id} is locked while executing")]
    WorkerLocked {
        /// Id of the locked worker.
        id: WorkerId,
    },

    /// No listener with this id is registered.
    #[error("listener {id} not found")]
    ListenerNotFound {
        /// Requested id.
        id: ListenerId,
    },

    /// The listener is already subscribed to this event kind.
    #[error("listener {id} is already subscribed to {kind}")]
    DuplicateListener {
        /// Id of the listener.
        id: ListenerId,
        /// Kind it is already subscribed to.
        kind: EventKind,
    },

    /// A subscription request named no event kinds.
    #[error("listener {id} must subscribe to at least one event kind")]
    NoEventKinds {
        /// Id of the listener.
        id: ListenerId,
    },

    /// Liveness check failed: the scheduling loop is not in `Process`.
    #[error("dispatcher status is {status}, not process")]
    NotRunning {
        /// Status observed by the check.
        status: DispatcherStatus,
    },

    /// `run()` was called while the scheduling loop is already running (or has run).
    #[error("dispatcher is already running")]
    AlreadyRunning,
}

impl DispatcherError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use workvisor::DispatcherError;
    ///
    /// assert_eq!(DispatcherError::AlreadyRunning.as_label(), "dispatcher_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatcherError::ProtectedListener { .. } => "dispatcher_protected_listener",
            DispatcherError::TaskInExecution { .. } => "dispatcher_task_in_execution",
            DispatcherError::TaskNotFound { .. } => "dispatcher_task_not_found",
            DispatcherError::WorkerNotFound { .. } => "dispatcher_worker_not_found",
            DispatcherError::WorkerLocked { .. } => "dispatcher_worker_locked",
            DispatcherError::ListenerNotFound { .. } => "dispatcher_listener_not_found",
            DispatcherError::DuplicateListener { .. } => "dispatcher_duplicate_listener",
            DispatcherError::NoEventKinds { .. } => "dispatcher_no_event_kinds",
            DispatcherError::NotRunning { .. } => "dispatcher_not_running",
            DispatcherError::AlreadyRunning => "dispatcher_already_running",
        }
    }
}

/// # Errors produced by task execution.
///
/// Captured on the task as its last error and reflected in its status:
/// `Fail` and `Panicked` lead to [`TaskStatus::Fail`](crate::TaskStatus::Fail),
/// `Timeout` to [`TaskStatus::FailByTimeout`](crate::TaskStatus::FailByTimeout).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task execution exceeded its timeout duration.
    ///
    /// Bookkeeping only: the task body is not interrupted.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The task body panicked.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use workvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns `true` for [`TaskError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }
}

/// Renders a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
