//! # Task abstractions and specifications.
//!
//! This module provides the core task-related types:
//! - [`Task`] - trait for the async work a task executes
//! - [`TaskFn`] - function-backed task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskSpec`] - submission descriptor bundling the work with its scheduling attributes
//! - [`TaskStatus`] - lifecycle states
//! - [`TaskSnapshot`] - value copy returned by introspection

mod snapshot;
mod spec;
mod spec_builder;
mod status;
mod task;
mod task_fn;

pub use snapshot::TaskSnapshot;
pub use spec::TaskSpec;
pub use spec_builder::TaskSpecBuilder;
pub use status::TaskStatus;
pub use task::{Task, TaskContext, TaskRef};
pub use task_fn::TaskFn;
