//! # Task submission descriptor.
//!
//! Defines [`TaskSpec`], which bundles the work with the scheduling attributes
//! the dispatcher needs (priority, repeat policy and interval, timeout, start delay).
//!
//! A spec can be created:
//! - **Explicitly** with [`TaskSpec::new`] and the `with_*` setters
//! - **Fluently** with [`TaskSpec::builder`](crate::TaskSpecBuilder) from a closure
//!
//! The spec is passed to [`Dispatcher::add_task`](crate::Dispatcher::add_task).

use std::time::Duration;

use crate::policies::RepeatPolicy;
use crate::tasks::task::TaskRef;

/// Specification of a task submitted to the dispatcher.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use workvisor::{RepeatPolicy, TaskContext, TaskError, TaskFn, TaskSpec};
///
/// let poll = TaskFn::arc("poll", |_ctx: TaskContext| async move { Ok::<(), TaskError>(()) });
///
/// let spec = TaskSpec::new(poll)
///     .with_priority(5)
///     .with_repeat(RepeatPolicy::Forever)
///     .with_repeat_interval(Duration::from_secs(30))
///     .with_timeout(Some(Duration::from_secs(10)));
///
/// assert_eq!(spec.name(), "poll");
/// assert_eq!(spec.priority(), 5);
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    task: TaskRef,
    priority: i64,
    repeat: RepeatPolicy,
    repeat_interval: Duration,
    timeout: Option<Duration>,
    delay: Duration,
}

impl TaskSpec {
    /// Creates a one-shot spec with priority 0, no timeout and no start delay.
    pub fn new(task: TaskRef) -> Self {
        Self {
            task,
            priority: 0,
            repeat: RepeatPolicy::Never,
            repeat_interval: Duration::ZERO,
            timeout: None,
            delay: Duration::ZERO,
        }
    }

    /// Returns reference to the work.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Convenience: returns the work's name.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Priority; higher runs first among eligible tasks.
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Returns the repeat policy.
    pub fn repeat(&self) -> RepeatPolicy {
        self.repeat
    }

    /// Delay between a finished run and the next one.
    pub fn repeat_interval(&self) -> Duration {
        self.repeat_interval
    }

    /// Returns the timeout, if configured (`Some(0)` is treated as no timeout).
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|d| !d.is_zero())
    }

    /// Delay between submission and the first allowed start.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns a new spec with updated priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Returns a new spec with updated repeat policy.
    pub fn with_repeat(mut self, repeat: RepeatPolicy) -> Self {
        self.repeat = repeat;
        self
    }

    /// Returns a new spec with updated repeat interval.
    pub fn with_repeat_interval(mut self, interval: Duration) -> Self {
        self.repeat_interval = interval;
        self
    }

    /// Returns a new spec with updated timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a new spec with updated start delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name())
            .field("priority", &self.priority)
            .field("repeat", &self.repeat)
            .field("repeat_interval", &self.repeat_interval)
            .field("timeout", &self.timeout)
            .field("delay", &self.delay)
            .finish()
    }
}
