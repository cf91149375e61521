//! Scheduler core: dispatcher, worker loops and scheduling.
//!
//! The public API from this module is [`Dispatcher`] (with its builder, status and stats).
//!
//! Internal modules:
//! - [`dispatcher`]: state, control API and the run loop;
//! - [`schedule`]: execute-tick, completion handling and notify-tick;
//! - [`runner`]: worker loop and single-run execution with timeout bookkeeping;
//! - [`pool`] / [`queue`]: worker slots and the task collection;
//! - [`introspect`]: snapshots, metadata and stats;
//! - [`shutdown`]: cross-platform termination signals.

mod builder;
mod dispatcher;
mod introspect;
mod pool;
mod queue;
mod runner;
mod schedule;
pub(crate) mod shutdown;

#[cfg(test)]
mod tests;

pub use builder::DispatcherBuilder;
pub use dispatcher::{Dispatcher, DispatcherStatus};
pub use introspect::DispatcherStats;
