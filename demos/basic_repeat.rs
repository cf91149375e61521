//! # Example: basic_repeat
//!
//! One worker, one repeat task, and the built-in logging listener.
//!
//! Demonstrates how to:
//! - Build a [`WorkersComponent`] from [`Config`].
//! - Submit a task with priority, a repeat policy, a repeat interval and a timeout.
//! - Watch its lifecycle through a custom [`Listener`].
//!
//! ## Flow
//! ```text
//! add_task(priority 5, Times(1), 200ms, timeout 1s)
//!     ├─► TaskAdd
//!     ├─► execute-tick: TaskExecuteStart, worker Wait → Busy, task Wait → Process
//!     ├─► completion:   TaskExecuteStop,  task Process → Success → RepeatWait, worker Busy → Wait
//!     ├─► 200ms later:  task RepeatWait → Wait, runs again
//!     └─► completion:   task Process → Success (no repeats left)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=workers=debug cargo run --example basic_repeat
//! ```

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use workvisor::{
    Config, EventKind, Listener, RepeatPolicy, TaskContext, TaskError, TaskSpec, WorkersComponent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. One worker, fast ticks, built-in logging on
    let cfg = Config {
        workers_count: 1,
        execute_tasks_interval: Duration::from_millis(50),
        notify_listeners_interval: Duration::from_millis(50),
        ..Config::default()
    };
    let workers = WorkersComponent::new(cfg).await;
    let dispatcher = workers.dispatcher().clone();

    // 2. Print every task status transition
    dispatcher
        .add_listener(
            &[EventKind::TaskStatusChanged],
            Listener::from_fn("status-printer", |e| {
                if let (Some(task), Some((prev, cur))) = (&e.task, e.task_status()) {
                    println!("[{}] {prev} -> {cur} (attempts: {})", task.name, task.attempts);
                }
            }),
        )
        .await?;

    // 3. A task that runs twice, 200ms apart
    let spec = TaskSpec::builder("report")
        .with_priority(5)
        .with_repeat(RepeatPolicy::Times(1))
        .with_repeat_interval(Duration::from_millis(200))
        .with_timeout(Duration::from_secs(1))
        .build(|ctx: TaskContext| async move {
            println!("[report] run #{}", ctx.attempt);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<(), TaskError>(())
        });
    let id = dispatcher.add_task(spec).await;

    // 4. Stop after both runs are done
    let stopper = dispatcher.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        stopper.shutdown();
    });
    workers.run().await?;

    if let Some(meta) = dispatcher.task_metadata(id).await {
        println!("{}", serde_json::to_string_pretty(&meta)?);
    }
    Ok(())
}
