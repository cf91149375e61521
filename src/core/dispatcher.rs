//! # Dispatcher: worker pool, task queue and listener registry.
//!
//! The [`Dispatcher`] owns all scheduler state and drives it from a single control loop.
//!
//! ## Architecture
//! ```text
//!  add_task / add_worker / add_listener ...        (any task, via Arc<Dispatcher>)
//!        │
//!        ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ Dispatcher                                                           │
//! │  workers: RwLock<WorkerPool>    tasks: RwLock<TaskQueue>             │
//! │  listeners: RwLock<Registry>    locked_listeners: RwLock<HashSet>    │
//! │  events: EventQueue (pending until next notify-tick)                 │
//! └──────┬────────────────────────────▲────────────────────────┬─────────┘
//!        │ execute-tick: Assignment   │ Completion             │ notify-tick
//!        ▼                            │                        ▼
//!   worker loop 1..N ── run_once ─────┘                 listeners (in order)
//! ```
//!
//! ## Run loop
//! ```text
//! run():
//!   status Wait → Process
//!   loop select (biased):
//!     ├─ shutdown token       → break
//!     ├─ intervals changed    → rebuild tickers
//!     ├─ completion received  → apply to worker/task, maybe schedule repeat
//!     ├─ execute tick         → promote due repeats, assign tasks to idle workers
//!     └─ notify tick          → deliver pending events
//!   status → Cancel
//!   close assignment channels, wait for every in-flight run, apply completions
//!   final notify
//! ```
//!
//! ## Lock order
//! `workers → tasks → listeners`, and `locked_listeners → listeners`.
//! Listener code never runs while any of these locks is held.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Notify, RwLock, mpsc};
use tokio::task::JoinSet;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, MIN_TICK};
use crate::error::DispatcherError;
use crate::events::{Event, EventKind, EventQueue, Status};
use crate::ids::{ListenerId, TaskId, WorkerId};
use crate::listeners::{Listener, Registry};
use crate::tasks::{TaskSpec, TaskStatus};
use crate::workers::WorkerStatus;

use super::builder::DispatcherBuilder;
use super::pool::{WorkerPool, WorkerSlot};
use super::queue::TaskQueue;
use super::runner::{Completion, work};

/// Status of the dispatcher itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatcherStatus {
    /// Created, loop not started.
    Wait,
    /// Loop running.
    Process,
    /// Shutdown requested or finished.
    Cancel,
}

impl DispatcherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatcherStatus::Wait => "wait",
            DispatcherStatus::Process => "process",
            DispatcherStatus::Cancel => "cancel",
        }
    }
}

impl fmt::Display for DispatcherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy)]
pub(super) struct Timing {
    pub(super) execute: Duration,
    pub(super) notify: Duration,
}

/// Background task scheduler.
///
/// Created through [`Dispatcher::new`] or [`Dispatcher::builder`]; all methods take
/// `&self`, so share it as `Arc<Dispatcher>`.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use workvisor::{Config, Dispatcher, TaskContext, TaskError, TaskSpec};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), workvisor::DispatcherError> {
///     let cfg = Config {
///         execute_tasks_interval: Duration::from_millis(10),
///         notify_listeners_interval: Duration::from_millis(10),
///         ..Config::default()
///     };
///     let dispatcher = Dispatcher::new(cfg);
///     dispatcher.add_worker().await;
///
///     dispatcher
///         .add_task(TaskSpec::builder("hello").build(|_ctx: TaskContext| async {
///             println!("hello from a worker");
///             Ok::<(), TaskError>(())
///         }))
///         .await;
///
///     let d = dispatcher.clone();
///     tokio::spawn(async move {
///         tokio::time::sleep(Duration::from_millis(50)).await;
///         d.shutdown();
///     });
///     dispatcher.run().await
/// }
/// ```
pub struct Dispatcher {
    pub(super) timing: RwLock<Timing>,
    pub(super) timing_changed: Notify,

    pub(super) workers: RwLock<WorkerPool>,
    pub(super) tasks: RwLock<TaskQueue>,
    pub(super) listeners: RwLock<Registry>,
    pub(super) locked_listeners: RwLock<HashSet<ListenerId>>,
    pub(super) status: RwLock<DispatcherStatus>,

    pub(super) events: EventQueue,
    pub(super) done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: Mutex<Option<mpsc::UnboundedReceiver<Completion>>>,
    executions: StdMutex<JoinSet<()>>,
    token: CancellationToken,
}

impl Dispatcher {
    /// Creates a dispatcher with no workers and no listeners.
    pub fn new(cfg: Config) -> Arc<Self> {
        Self::builder(cfg).build()
    }

    /// Returns a builder for attaching listeners before the dispatcher is shared.
    pub fn builder(cfg: Config) -> DispatcherBuilder {
        DispatcherBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: &Config,
        registry: Registry,
        locked: HashSet<ListenerId>,
        events: EventQueue,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            timing: RwLock::new(Timing {
                execute: cfg.execute_interval(),
                notify: cfg.notify_interval(),
            }),
            timing_changed: Notify::new(),
            workers: RwLock::new(WorkerPool::default()),
            tasks: RwLock::new(TaskQueue::new(cfg.completed_capacity)),
            listeners: RwLock::new(registry),
            locked_listeners: RwLock::new(locked),
            status: RwLock::new(DispatcherStatus::Wait),
            events,
            done_tx,
            done_rx: Mutex::new(Some(done_rx)),
            executions: StdMutex::new(JoinSet::new()),
            token: CancellationToken::new(),
        }
    }

    // ---- Workers ----

    /// Creates an idle worker and starts its execution loop.
    pub async fn add_worker(&self) -> WorkerId {
        let (tx, rx) = mpsc::channel(1);
        let slot = WorkerSlot::new(tx);
        let id = slot.id;
        let snapshot = slot.snapshot();

        self.workers.write().await.push(slot);
        self.spawn_execution(work(id, rx, self.done_tx.clone()));

        tracing::debug!(worker.id = %id, "worker added");
        self.events
            .publish(Event::new(EventKind::WorkerAdd).with_worker(snapshot));
        id
    }

    /// Removes a worker.
    ///
    /// A busy worker's task moves to `Kill` and keeps running detached; its
    /// completion is discarded when it arrives.
    pub async fn remove_worker(&self, id: WorkerId) -> Result<(), DispatcherError> {
        let mut workers = self.workers.write().await;
        let slot = workers
            .get(id)
            .ok_or(DispatcherError::WorkerNotFound { id })?;
        if slot.locked && slot.status == WorkerStatus::Busy {
            return Err(DispatcherError::WorkerLocked { id });
        }
        let Some(slot) = workers.remove(id) else {
            return Err(DispatcherError::WorkerNotFound { id });
        };
        let snapshot = slot.snapshot();

        if let Some(task_id) = slot.task {
            let mut tasks = self.tasks.write().await;
            if let Some(task) = tasks.get_mut(task_id) {
                let prev = task.set_status(TaskStatus::Kill);
                task.worker = None;
                task.started_at = None;
                tracing::info!(
                    worker.id = %id,
                    task.id = %task_id,
                    task.name = task.spec.name(),
                    "busy worker removed, task killed and left running"
                );
                self.publish_task_status(task.snapshot(), prev, TaskStatus::Kill);
                for evicted in tasks.mark_finished(task_id) {
                    self.events
                        .publish(Event::new(EventKind::TaskRemove).with_task(evicted.snapshot()));
                }
            }
        }
        drop(workers);

        tracing::debug!(worker.id = %id, "worker removed");
        self.events
            .publish(Event::new(EventKind::WorkerRemove).with_worker(snapshot));
        Ok(())
    }

    /// Sets the worker's locked flag; a locked worker can't be removed while busy.
    pub async fn set_worker_locked(&self, id: WorkerId, locked: bool) -> Result<(), DispatcherError> {
        let mut workers = self.workers.write().await;
        let slot = workers
            .get_mut(id)
            .ok_or(DispatcherError::WorkerNotFound { id })?;
        slot.locked = locked;
        Ok(())
    }

    // ---- Tasks ----

    /// Queues a task in `Wait`; it becomes eligible after its start delay.
    pub async fn add_task(&self, spec: TaskSpec) -> TaskId {
        let now = Instant::now();
        let snapshot = self.tasks.write().await.insert(spec, now).snapshot();

        tracing::debug!(
            task.id = %snapshot.id,
            task.name = %snapshot.name,
            task.priority = snapshot.priority,
            "task added"
        );
        let id = snapshot.id;
        self.events
            .publish(Event::new(EventKind::TaskAdd).with_task(snapshot));
        id
    }

    /// Removes a task that is not bound to a worker.
    pub async fn remove_task(&self, id: TaskId) -> Result<(), DispatcherError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get(id).ok_or(DispatcherError::TaskNotFound { id })?;
        if task.worker.is_some() {
            return Err(DispatcherError::TaskInExecution { id });
        }
        let Some(removed) = tasks.remove(id) else {
            return Err(DispatcherError::TaskNotFound { id });
        };
        drop(tasks);

        tracing::debug!(task.id = %id, task.name = removed.spec.name(), "task removed");
        self.events
            .publish(Event::new(EventKind::TaskRemove).with_task(removed.snapshot()));
        Ok(())
    }

    // ---- Listeners ----

    /// Subscribes `listener` to every kind in `kinds`.
    ///
    /// Fails with [`DispatcherError::DuplicateListener`] (and changes nothing) if the
    /// listener is already subscribed to one of them.
    pub async fn add_listener(
        &self,
        kinds: &[EventKind],
        listener: Listener,
    ) -> Result<ListenerId, DispatcherError> {
        let id = listener.id();
        let locked = self.locked_listeners.read().await;
        let mut registry = self.listeners.write().await;
        let added = registry.subscribe(kinds, listener)?;
        if let Some(snapshot) = registry.snapshot(id, &locked) {
            for kind in added {
                self.events.publish(
                    Event::new(EventKind::ListenerAdd).with_listener(snapshot.clone(), kind),
                );
            }
        }
        Ok(id)
    }

    /// Unsubscribes a listener from `kinds`.
    pub async fn remove_listener(
        &self,
        kinds: &[EventKind],
        id: ListenerId,
    ) -> Result<(), DispatcherError> {
        let locked = self.locked_listeners.read().await;
        if locked.contains(&id) {
            return Err(DispatcherError::ProtectedListener { id });
        }
        let mut registry = self.listeners.write().await;
        let snapshot = registry.snapshot(id, &locked);
        let removed = registry.unsubscribe(kinds, id)?;
        self.publish_listener_removed(snapshot, removed);
        Ok(())
    }

    /// Unsubscribes a listener from every kind.
    pub async fn remove_listener_all(&self, id: ListenerId) -> Result<(), DispatcherError> {
        let locked = self.locked_listeners.read().await;
        if locked.contains(&id) {
            return Err(DispatcherError::ProtectedListener { id });
        }
        let mut registry = self.listeners.write().await;
        let snapshot = registry.snapshot(id, &locked);
        let removed = registry.unsubscribe_all(id)?;
        self.publish_listener_removed(snapshot, removed);
        Ok(())
    }

    /// Protects a registered listener from removal.
    pub async fn lock_listener(&self, id: ListenerId) -> Result<(), DispatcherError> {
        let mut locked = self.locked_listeners.write().await;
        if !self.listeners.read().await.contains(id) {
            return Err(DispatcherError::ListenerNotFound { id });
        }
        locked.insert(id);
        Ok(())
    }

    /// Lifts the protection; returns `false` if the listener wasn't locked.
    pub async fn unlock_listener(&self, id: ListenerId) -> bool {
        self.locked_listeners.write().await.remove(&id)
    }

    /// Ids in the locked-set.
    pub async fn locked_listeners(&self) -> Vec<ListenerId> {
        let mut ids: Vec<ListenerId> = self.locked_listeners.read().await.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    // ---- Timing ----

    /// Changes the execute-tick period (clamped to at least 1ms).
    pub async fn set_execute_tasks_interval(&self, every: Duration) {
        self.timing.write().await.execute = every.max(MIN_TICK);
        self.timing_changed.notify_one();
    }

    /// Changes the notify-tick period (clamped to at least 1ms).
    pub async fn set_notify_listeners_interval(&self, every: Duration) {
        self.timing.write().await.notify = every.max(MIN_TICK);
        self.timing_changed.notify_one();
    }

    /// Current `(execute, notify)` tick periods.
    pub async fn intervals(&self) -> (Duration, Duration) {
        let t = *self.timing.read().await;
        (t.execute, t.notify)
    }

    // ---- Lifecycle ----

    /// Runs the scheduling loop until [`shutdown`](Self::shutdown) is called.
    ///
    /// Returns after every in-flight run (including runs on removed workers) has
    /// finished and pending events were delivered. Can only run once.
    pub async fn run(&self) -> Result<(), DispatcherError> {
        let mut done = self
            .done_rx
            .lock()
            .await
            .take()
            .ok_or(DispatcherError::AlreadyRunning)?;
        self.set_status(DispatcherStatus::Process).await;
        tracing::info!("dispatcher started");

        let (exec_every, notify_every) = self.intervals().await;
        let mut execute = ticker(exec_every, true);
        let mut notify = ticker(notify_every, true);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = self.timing_changed.notified() => {
                    let (exec_every, notify_every) = self.intervals().await;
                    if execute.period() != exec_every {
                        execute = ticker(exec_every, false);
                    }
                    if notify.period() != notify_every {
                        notify = ticker(notify_every, false);
                    }
                    tracing::debug!(
                        execute_ms = exec_every.as_millis() as u64,
                        notify_ms = notify_every.as_millis() as u64,
                        "tick intervals updated"
                    );
                }
                Some(c) = done.recv() => self.complete(c).await,
                _ = execute.tick() => self.execute_tasks().await,
                _ = notify.tick() => self.notify_listeners().await,
            }
        }

        self.set_status(DispatcherStatus::Cancel).await;
        tracing::info!("dispatcher stopping, waiting for in-flight tasks");
        self.drain(&mut done).await;
        self.notify_listeners().await;
        tracing::info!("dispatcher stopped");
        Ok(())
    }

    /// Requests a cooperative shutdown of [`run`](Self::run).
    ///
    /// Running task bodies are never interrupted.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    async fn drain(&self, done: &mut mpsc::UnboundedReceiver<Completion>) {
        self.workers.write().await.close_all();
        let mut running = std::mem::take(
            &mut *self
                .executions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        loop {
            tokio::select! {
                Some(c) = done.recv() => self.complete(c).await,
                joined = running.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => tracing::error!(error = %e, "worker loop aborted"),
                    None => break,
                },
            }
        }
        while let Ok(c) = done.try_recv() {
            self.complete(c).await;
        }
    }

    async fn set_status(&self, next: DispatcherStatus) {
        let prev = std::mem::replace(&mut *self.status.write().await, next);
        if prev != next {
            self.events.publish(
                Event::new(EventKind::DispatcherStatusChanged)
                    .with_status(Status::Dispatcher(prev), Status::Dispatcher(next)),
            );
        }
    }

    fn spawn_execution<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut running = self
            .executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while running.try_join_next().is_some() {}
        running.spawn(fut);
    }

    fn publish_listener_removed(
        &self,
        snapshot: Option<crate::listeners::ListenerSnapshot>,
        removed: Vec<EventKind>,
    ) {
        let Some(snapshot) = snapshot else { return };
        tracing::debug!(listener.id = %snapshot.id, kinds = removed.len(), "listener unsubscribed");
        for kind in removed {
            self.events
                .publish(Event::new(EventKind::ListenerRemove).with_listener(snapshot.clone(), kind));
        }
    }
}

/// Builds a ticker; `immediate` fires the first tick right away.
fn ticker(period: Duration, immediate: bool) -> Interval {
    let period = period.max(MIN_TICK);
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut t = time::interval_at(start, period);
    t.set_missed_tick_behavior(MissedTickBehavior::Delay);
    t
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending_events", &self.events.len())
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}
