//! # Example: dynamic_workers
//!
//! Resizes the worker pool while tasks are running and reports stats.
//!
//! Demonstrates how to:
//! - Add workers at runtime with [`WorkersComponent::add_workers`].
//! - Remove a busy worker (its task is marked `Kill` and keeps running detached).
//! - Read [`DispatcherStats`](workvisor::DispatcherStats) and worker snapshots.
//! - Stop on Ctrl-C / SIGTERM with [`WorkersComponent::run_until_signal`].
//!
//! ## Run
//! ```bash
//! RUST_LOG=info,workers=debug cargo run --example dynamic_workers
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use workvisor::{
    Config, RepeatPolicy, TaskContext, TaskError, TaskSpec, WorkerStatus, WorkersComponent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let workers = Arc::new(
        WorkersComponent::new(Config {
            workers_count: 1,
            execute_tasks_interval: Duration::from_millis(100),
            notify_listeners_interval: Duration::from_millis(100),
            ..Config::default()
        })
        .await,
    );
    let dispatcher = workers.dispatcher().clone();

    // Ten slow jobs with mixed priorities plus one endless heartbeat.
    for i in 0..10 {
        let spec = TaskSpec::builder(format!("job-{i}"))
            .with_priority(i % 3)
            .build(move |_ctx: TaskContext| async move {
                tokio::time::sleep(Duration::from_millis(400 + 50 * i as u64)).await;
                if i == 7 {
                    return Err(TaskError::fail("job 7 always fails"));
                }
                Ok(())
            });
        dispatcher.add_task(spec).await;
    }
    dispatcher
        .add_task(
            TaskSpec::builder("heartbeat")
                .with_priority(10)
                .with_repeat(RepeatPolicy::Forever)
                .with_repeat_interval(Duration::from_secs(1))
                .build(|ctx: TaskContext| async move {
                    tracing::info!(attempt = ctx.attempt, "heartbeat");
                    Ok(())
                }),
        )
        .await;

    let control = {
        let workers = Arc::clone(&workers);
        tokio::spawn(async move {
            let d = workers.dispatcher();

            tokio::time::sleep(Duration::from_millis(500)).await;
            let added = workers.add_workers(3).await;
            println!("added {} workers", added.len());

            tokio::time::sleep(Duration::from_millis(300)).await;
            let busy = d
                .workers()
                .await
                .into_iter()
                .find(|w| w.status == WorkerStatus::Busy && !w.locked);
            if let Some(w) = busy {
                match workers.kill_workers(&[w.id]).await {
                    Ok(()) => println!("removed busy worker {} (task {:?})", w.id, w.task),
                    Err(e) => println!("could not remove worker {}: {e}", w.id),
                }
            }

            for _ in 0..5 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let stats = d.stats().await;
                println!(
                    "workers {} (busy {}), tasks {}: {:?}",
                    stats.workers_total, stats.workers_busy, stats.tasks_total, stats.tasks_by_status
                );
            }
            println!("done, press Ctrl-C to stop");
        })
    };

    workers.run_until_signal().await?;
    control.abort();
    Ok(())
}
