//! # Component wrapper around the dispatcher.
//!
//! [`WorkersComponent`] is what an application wires in: it builds the [`Dispatcher`]
//! from [`Config`], starts the configured number of workers, attaches the built-in
//! listeners (locked) and exposes the dashboard-style bulk actions.
//!
//! ```text
//! Config ──► WorkersComponent::new
//!              ├─ Dispatcher::builder(cfg)
//!              │    ├─ LogListener      (EventKind::ALL, locked)    if logging_listener
//!              │    └─ MetricsListener  (status changes, locked)    feature = "metrics"
//!              └─ add_worker() × workers_count
//!
//! config changed ──► apply_config(cfg)
//!              ├─ workers: grow only
//!              ├─ tick intervals
//!              └─ logging listener on/off
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::core::{Dispatcher, DispatcherStatus};
use crate::core::shutdown::wait_for_shutdown_signal;
use crate::error::DispatcherError;
use crate::events::EventKind;
use crate::ids::{ListenerId, TaskId, WorkerId};
use crate::listeners::Listener;
use crate::listeners::embedded::LogListener;

#[cfg(feature = "metrics")]
use crate::listeners::embedded::{METRICS_LISTENER_EVENTS, MetricsCollector, MetricsListener};

/// Application-facing wrapper that owns a configured [`Dispatcher`].
///
/// ## Example
/// ```rust,no_run
/// use workvisor::{Config, TaskContext, TaskError, TaskSpec, WorkersComponent};
///
/// #[tokio::main]
/// async fn main() -> Result<(), workvisor::DispatcherError> {
///     let workers = WorkersComponent::new(Config::default()).await;
///     workers
///         .dispatcher()
///         .add_task(TaskSpec::builder("warmup").build(|_ctx: TaskContext| async {
///             Ok::<(), TaskError>(())
///         }))
///         .await;
///
///     // Runs until SIGINT / SIGTERM / SIGQUIT, then waits for in-flight tasks.
///     workers.run_until_signal().await
/// }
/// ```
pub struct WorkersComponent {
    dispatcher: Arc<Dispatcher>,
    log_listener: Mutex<Option<ListenerId>>,
}

impl WorkersComponent {
    /// Builds the dispatcher and starts `cfg.workers_count` workers.
    pub async fn new(cfg: Config) -> Self {
        let mut builder = Dispatcher::builder(cfg.clone());

        let mut log_listener = None;
        if cfg.logging_listener {
            let listener = Listener::new(LogListener::new());
            log_listener = Some(listener.id());
            builder = builder.with_locked_listener(&EventKind::ALL, listener);
        }
        #[cfg(feature = "metrics")]
        {
            builder = builder
                .with_locked_listener(&METRICS_LISTENER_EVENTS, Listener::new(MetricsListener::new()));
        }

        let dispatcher = builder.build();
        for _ in 0..cfg.workers_count {
            dispatcher.add_worker().await;
        }
        tracing::info!(
            workers = cfg.workers_count,
            logging = cfg.logging_listener,
            "workers component initialized"
        );

        Self {
            dispatcher,
            log_listener: Mutex::new(log_listener),
        }
    }

    /// The wrapped dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Re-applies configuration to the running component.
    ///
    /// The worker pool only grows: a lower `workers_count` than the current pool size
    /// removes nothing. `completed_capacity` and `events_capacity` are fixed at construction.
    pub async fn apply_config(&self, cfg: &Config) -> Result<(), DispatcherError> {
        let current = self.dispatcher.workers().await.len();
        if cfg.workers_count > current {
            let added = self.add_workers(cfg.workers_count - current).await;
            tracing::info!(added = added.len(), total = cfg.workers_count, "worker pool grown");
        }

        self.dispatcher
            .set_execute_tasks_interval(cfg.execute_tasks_interval)
            .await;
        self.dispatcher
            .set_notify_listeners_interval(cfg.notify_listeners_interval)
            .await;

        self.set_logging(cfg.logging_listener).await
    }

    async fn set_logging(&self, enabled: bool) -> Result<(), DispatcherError> {
        let mut current = self.log_listener.lock().await;
        match (enabled, *current) {
            (true, None) => {
                let listener = Listener::new(LogListener::new());
                let id = self.dispatcher.add_listener(&EventKind::ALL, listener).await?;
                self.dispatcher.lock_listener(id).await?;
                *current = Some(id);
                tracing::info!(listener.id = %id, "logging listener attached");
            }
            (false, Some(id)) => {
                self.dispatcher.unlock_listener(id).await;
                self.dispatcher.remove_listener_all(id).await?;
                *current = None;
                tracing::info!(listener.id = %id, "logging listener detached");
            }
            _ => {}
        }
        Ok(())
    }

    /// Adds `count` workers and returns their ids.
    pub async fn add_workers(&self, count: usize) -> Vec<WorkerId> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.dispatcher.add_worker().await);
        }
        ids
    }

    /// Removes the given workers, stopping at the first error.
    pub async fn kill_workers(&self, ids: &[WorkerId]) -> Result<(), DispatcherError> {
        for &id in ids {
            self.dispatcher.remove_worker(id).await?;
        }
        Ok(())
    }

    /// Removes the given tasks, stopping at the first error.
    pub async fn remove_tasks_by_id(&self, ids: &[TaskId]) -> Result<(), DispatcherError> {
        for &id in ids {
            self.dispatcher.remove_task(id).await?;
        }
        Ok(())
    }

    /// Unsubscribes the given listeners from every kind, stopping at the first error.
    pub async fn remove_listeners(&self, ids: &[ListenerId]) -> Result<(), DispatcherError> {
        for &id in ids {
            self.dispatcher.remove_listener_all(id).await?;
        }
        Ok(())
    }

    /// Gauge collector for the wrapped dispatcher.
    #[cfg(feature = "metrics")]
    pub fn metrics_collector(&self) -> MetricsCollector {
        MetricsCollector::new(Arc::clone(&self.dispatcher))
    }

    /// Liveness check for health endpoints: healthy only while the scheduling loop
    /// is in [`DispatcherStatus::Process`].
    pub async fn liveness_check(&self) -> Result<(), DispatcherError> {
        match self.dispatcher.status().await {
            DispatcherStatus::Process => Ok(()),
            status => Err(DispatcherError::NotRunning { status }),
        }
    }

    /// Runs the dispatcher until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<(), DispatcherError> {
        self.dispatcher.run().await
    }

    /// Runs the dispatcher until a termination signal arrives, then shuts it down
    /// and waits for in-flight tasks.
    pub async fn run_until_signal(&self) -> Result<(), DispatcherError> {
        let run = self.dispatcher.run();
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => return res,
            sig = wait_for_shutdown_signal() => match sig {
                Ok(()) => self.dispatcher.shutdown(),
                Err(e) => tracing::warn!(error = %e, "signal handlers unavailable, running until shutdown"),
            },
        }
        run.await
    }

    /// Requests a cooperative shutdown.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }
}
