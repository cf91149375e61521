use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use crate::{RepeatPolicy, TaskContext, TaskError, TaskFn, TaskRef, TaskSpec};

/// Builder for TaskSpec with fluent API
#[derive(Clone, Debug)]
pub struct TaskSpecBuilder {
    name: Cow<'static, str>,
    priority: i64,
    repeat: RepeatPolicy,
    repeat_interval: Duration,
    timeout: Option<Duration>,
    delay: Duration,
}

impl TaskSpecBuilder {
    /// Creates a new builder with the given task name
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            repeat: RepeatPolicy::default(),
            repeat_interval: Duration::ZERO,
            timeout: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_repeat(mut self, repeat: RepeatPolicy) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_repeat_interval(mut self, interval: Duration) -> Self {
        self.repeat_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Build TaskSpec from a closure
    pub fn build<F, Fut>(self, f: F) -> TaskSpec
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let task = TaskFn::arc(self.name.clone(), f);
        self.build_from_task(task)
    }

    /// Build TaskSpec from an existing TaskRef (the builder's name is ignored)
    pub fn build_from_task(self, task: TaskRef) -> TaskSpec {
        TaskSpec::new(task)
            .with_priority(self.priority)
            .with_repeat(self.repeat)
            .with_repeat_interval(self.repeat_interval)
            .with_timeout(self.timeout)
            .with_delay(self.delay)
    }
}

impl TaskSpec {
    /// Creates a builder for constructing TaskSpec with fluent API
    pub fn builder(name: impl Into<Cow<'static, str>>) -> TaskSpecBuilder {
        TaskSpecBuilder::new(name)
    }
}
