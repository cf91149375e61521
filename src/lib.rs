//! # workvisor
//!
//! **Workvisor** is an in-process background task dispatcher for Tokio applications.
//!
//! It runs submitted tasks on a resizable pool of workers, re-runs repeat tasks after
//! their interval, and reports every lifecycle change to pluggable listeners. All state
//! (workers, tasks, listeners, counters) can be inspected while the dispatcher runs.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   TaskSpec   │   │   TaskSpec   │   │   Listener   │
//!     │ (priority 5) │   │ (repeat: 3)  │   │ (Listen impl)│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ add_task         ▼ add_task         ▼ add_listener(kinds)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                       │
//! │  - TaskQueue     (Wait / RepeatWait / running / finished history) │
//! │  - WorkerPool    (Wait / Busy slots, optional lock)               │
//! │  - Registry      (listeners by EventKind, locked-set)             │
//! │  - EventQueue    (events pending until the next notify-tick)      │
//! └──────┬─────────────────────────▲──────────────────────────┬───────┘
//!        │ execute-tick:           │ completion               │ notify-tick:
//!        │ highest priority first, │ Success / Fail /         │ drain events in
//!        │ FIFO among equals       │ FailByTimeout            │ publication order
//!        ▼                         │                          ▼
//!     ┌──────────┐ ┌──────────┐ ┌──┴───────┐          listener1.on_event()
//!     │ worker 1 │ │ worker 2 │ │ worker N │          listener2.on_event()
//!     └──────────┘ └──────────┘ └──────────┘          ...
//! ```
//!
//! ### Task lifecycle
//! ```text
//! add_task ──► Wait ──► Process ──┬─► Success ────────┐
//!               ▲                 ├─► Fail ───────────┤ repeats left?
//!               │                 ├─► FailByTimeout ──┤   yes ─► RepeatWait ─(interval)─┐
//!               │                 └─► Kill            │   no  ─► finished history       │
//!               └─────────────────────────────────────┴─────────────────────────────────┘
//! ```
//! A timeout never interrupts the task body: the run is recorded as `FailByTimeout`,
//! and the worker stays busy until the body actually returns.
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                         |
//! |-------------------|-----------------------------------------------------------------|--------------------------------------------|
//! | **Dispatching**   | Worker pool, priority queue, tick-driven assignment.            | [`Dispatcher`], [`DispatcherBuilder`]      |
//! | **Tasks**         | Define work as closures or trait objects with scheduling knobs. | [`Task`], [`TaskFn`], [`TaskSpec`]         |
//! | **Repeats**       | One-shot, bounded or endless re-runs after an interval.         | [`RepeatPolicy`]                           |
//! | **Listeners**     | Typed lifecycle events, protected (locked) listeners.           | [`Listen`], [`Listener`], [`EventKind`]    |
//! | **Introspection** | Snapshots, metadata maps and aggregate counters.                | [`TaskSnapshot`], [`DispatcherStats`]      |
//! | **Errors**        | Typed errors for control calls and task execution.              | [`DispatcherError`], [`TaskError`]         |
//! | **Component**     | Config-driven wrapper with built-in listeners and signals.      | [`WorkersComponent`], [`Config`]           |
//!
//! ## Optional features
//! - `metrics` _(default)_: exports [`MetricsListener`] and [`MetricsCollector`], backed by the `metrics` facade.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use workvisor::{Config, Dispatcher, EventKind, Listener, RepeatPolicy, TaskContext, TaskError, TaskSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), workvisor::DispatcherError> {
//!     let cfg = Config {
//!         execute_tasks_interval: Duration::from_millis(20),
//!         notify_listeners_interval: Duration::from_millis(20),
//!         ..Config::default()
//!     };
//!     let dispatcher = Dispatcher::builder(cfg)
//!         .with_listener(
//!             &[EventKind::TaskStatusChanged],
//!             Listener::from_fn("printer", |e| println!("{:?} -> {:?}", e.prev, e.current)),
//!         )
//!         .build();
//!     dispatcher.add_worker().await;
//!
//!     // Runs twice: the first run plus one repeat 100ms after it finishes.
//!     let spec = TaskSpec::builder("report")
//!         .with_priority(5)
//!         .with_repeat(RepeatPolicy::Times(1))
//!         .with_repeat_interval(Duration::from_millis(100))
//!         .with_timeout(Duration::from_secs(1))
//!         .build(|ctx: TaskContext| async move {
//!             println!("run #{}", ctx.attempt);
//!             Ok::<(), TaskError>(())
//!         });
//!     dispatcher.add_task(spec).await;
//!
//!     let d = dispatcher.clone();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(500)).await;
//!         d.shutdown();
//!     });
//!     dispatcher.run().await
//! }
//! ```
mod component;
mod config;
mod core;
mod error;
mod events;
mod ids;
mod listeners;
pub mod metadata;
mod policies;
mod tasks;
mod workers;

// ---- Public re-exports ----

pub use crate::core::{Dispatcher, DispatcherBuilder, DispatcherStats, DispatcherStatus};
pub use crate::core::shutdown::wait_for_shutdown_signal;
pub use component::WorkersComponent;
pub use config::{Config, MIN_TICK};
pub use error::{DispatcherError, TaskError};
pub use events::{Event, EventKind, Status};
pub use ids::{ListenerId, TaskId, WorkerId};
pub use listeners::embedded::{LOG_LISTENER_NAME, LogListener};
pub use listeners::{Listen, Listener, ListenerSnapshot};
pub use metadata::Metadata;
pub use policies::RepeatPolicy;
pub use tasks::{Task, TaskContext, TaskFn, TaskRef, TaskSnapshot, TaskSpec, TaskSpecBuilder, TaskStatus};
pub use workers::{WorkerSnapshot, WorkerStatus};

// Built-in metrics listener and gauge collector.
// Enabled by default; opt out with `default-features = false`.
#[cfg(feature = "metrics")]
pub use listeners::embedded::{
    METRICS_LISTENER_EVENTS, METRICS_LISTENER_NAME, MetricsCollector, MetricsListener,
};
