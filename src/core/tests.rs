use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::{Config, MIN_TICK};
use crate::error::{DispatcherError, TaskError};
use crate::events::{Event, EventKind};
use crate::ids::TaskId;
use crate::listeners::Listener;
use crate::policies::RepeatPolicy;
use crate::tasks::{TaskContext, TaskSpec, TaskStatus};
use crate::workers::WorkerStatus;

use super::pool::WorkerSlot;
use super::{Dispatcher, DispatcherStatus};

const TICK: Duration = Duration::from_millis(10);

fn cfg() -> Config {
    Config {
        execute_tasks_interval: TICK,
        notify_listeners_interval: TICK,
        logging_listener: false,
        ..Config::default()
    }
}

fn spawn_run(d: &Arc<Dispatcher>) -> JoinHandle<Result<(), DispatcherError>> {
    let d = Arc::clone(d);
    tokio::spawn(async move { d.run().await })
}

async fn stop(d: &Arc<Dispatcher>, run: JoinHandle<Result<(), DispatcherError>>) {
    d.shutdown();
    run.await.unwrap().unwrap();
}

/// Subscribes a listener that records every event.
async fn record(d: &Dispatcher) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    d.add_listener(
        &EventKind::ALL,
        Listener::from_fn("recorder", move |ev| sink.lock().unwrap().push(ev.clone())),
    )
    .await
    .unwrap();
    seen
}

fn task_transitions(events: &[Event], id: TaskId) -> Vec<(TaskStatus, TaskStatus)> {
    events
        .iter()
        .filter(|e| e.task.as_ref().is_some_and(|t| t.id == id))
        .filter_map(Event::task_status)
        .collect()
}

/// Task that appends its name to `log` and returns.
fn logging_task(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> TaskSpec {
    let log = Arc::clone(log);
    TaskSpec::builder(name).build(move |_ctx: TaskContext| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(name);
            Ok::<(), TaskError>(())
        }
    })
}

/// Task that sleeps for `d` and records each start instant.
fn sleeping_task(name: &'static str, d: Duration, starts: &Arc<Mutex<Vec<Instant>>>) -> TaskSpec {
    let starts = Arc::clone(starts);
    TaskSpec::builder(name).build(move |_ctx: TaskContext| {
        let starts = Arc::clone(&starts);
        async move {
            starts.lock().unwrap().push(Instant::now());
            time::sleep(d).await;
            Ok::<(), TaskError>(())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_higher_priority_runs_first() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    d.add_task(logging_task("low", &log).with_priority(1)).await;
    d.add_task(logging_task("high", &log).with_priority(5)).await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(100)).await;
    stop(&d, run).await;

    assert_eq!(*log.lock().unwrap(), vec!["high", "low"]);
}

#[tokio::test(start_paused = true)]
async fn test_equal_priority_is_fifo() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in ["a", "b", "c"] {
        d.add_task(logging_task(name, &log)).await;
    }

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(100)).await;
    stop(&d, run).await;

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn test_no_task_is_dispatched_twice() {
    let d = Dispatcher::new(cfg());
    for _ in 0..4 {
        d.add_worker().await;
    }
    let runs: Arc<Mutex<HashMap<TaskId, usize>>> = Arc::new(Mutex::new(HashMap::new()));

    let mut ids = Vec::new();
    for _ in 0..20 {
        let runs = Arc::clone(&runs);
        let spec = TaskSpec::builder("unit").build(move |ctx: TaskContext| {
            let runs = Arc::clone(&runs);
            async move {
                *runs.lock().unwrap().entry(ctx.id).or_default() += 1;
                time::sleep(Duration::from_millis(15)).await;
                Ok::<(), TaskError>(())
            }
        });
        ids.push(d.add_task(spec).await);
    }

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(500)).await;
    stop(&d, run).await;

    let runs = runs.lock().unwrap();
    assert_eq!(runs.len(), ids.len());
    assert!(runs.values().all(|n| *n == 1));
}

#[tokio::test(start_paused = true)]
async fn test_demo_repeat_scenario() {
    let d = Dispatcher::new(cfg());
    let worker = d.add_worker().await;
    let seen = record(&d).await;
    let starts = Arc::new(Mutex::new(Vec::new()));

    let spec = sleeping_task("demo", Duration::from_millis(20), &starts)
        .with_priority(5)
        .with_repeat(RepeatPolicy::Times(1))
        .with_repeat_interval(Duration::from_millis(200))
        .with_timeout(Some(Duration::from_secs(1)));
    let id = d.add_task(spec).await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_secs(1)).await;

    let task = d.task(id).await.unwrap();
    assert_eq!(task.attempts, 2);
    assert_eq!(task.status, TaskStatus::Success);
    assert!(task.worker.is_none());
    assert_eq!(d.worker(worker).await.unwrap().status, WorkerStatus::Wait);

    stop(&d, run).await;
    let events = seen.lock().unwrap().clone();

    use TaskStatus::*;
    assert_eq!(
        task_transitions(&events, id),
        vec![
            (Wait, Process),
            (Process, Success),
            (Success, RepeatWait),
            (RepeatWait, Wait),
            (Wait, Process),
            (Process, Success),
        ]
    );

    let kinds: Vec<EventKind> = events
        .iter()
        .filter(|e| e.task.as_ref().is_some_and(|t| t.id == id) || e.kind == EventKind::WorkerStatusChanged)
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds[0], EventKind::TaskAdd);
    assert_eq!(kinds[1], EventKind::TaskExecuteStart);
    assert_eq!(kinds[2], EventKind::WorkerStatusChanged);

    let worker_changes: Vec<_> = events.iter().filter_map(Event::worker_status).collect();
    assert_eq!(
        worker_changes,
        vec![
            (WorkerStatus::Wait, WorkerStatus::Busy),
            (WorkerStatus::Busy, WorkerStatus::Wait),
            (WorkerStatus::Wait, WorkerStatus::Busy),
            (WorkerStatus::Busy, WorkerStatus::Wait),
        ]
    );

    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 2);
    // 20ms of work plus the 200ms repeat interval
    assert!(starts[1] - starts[0] >= Duration::from_millis(220));
}

#[tokio::test(start_paused = true)]
async fn test_repeat_times_respects_interval() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    let starts = Arc::new(Mutex::new(Vec::new()));
    let interval = Duration::from_millis(50);

    let id = d
        .add_task(
            sleeping_task("tick", Duration::ZERO, &starts)
                .with_repeat(RepeatPolicy::Times(3))
                .with_repeat_interval(interval),
        )
        .await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_secs(1)).await;
    stop(&d, run).await;

    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 4);
    assert!(starts.windows(2).all(|w| w[1] - w[0] >= interval));
    assert_eq!(d.task(id).await.unwrap().attempts, 4);
}

#[tokio::test(start_paused = true)]
async fn test_forever_keeps_repeating() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    let starts = Arc::new(Mutex::new(Vec::new()));

    let id = d
        .add_task(
            sleeping_task("loop", Duration::ZERO, &starts)
                .with_repeat(RepeatPolicy::Forever)
                .with_repeat_interval(Duration::from_millis(100)),
        )
        .await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(550)).await;
    stop(&d, run).await;

    assert!(starts.lock().unwrap().len() >= 4);
    assert!(d.task(id).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_task_records_error() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    let id = d
        .add_task(
            TaskSpec::builder("broken")
                .build(|_ctx: TaskContext| async { Err::<(), _>(TaskError::fail("no route")) }),
        )
        .await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(100)).await;
    stop(&d, run).await;

    let task = d.task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Fail);
    assert_eq!(task.attempts, 1);
    assert_eq!(task.last_error.as_deref(), Some("execution failed: no route"));
}

#[tokio::test(start_paused = true)]
async fn test_add_workers_grows_pool() {
    let d = Dispatcher::new(cfg());
    for _ in 0..2 {
        d.add_worker().await;
    }
    for _ in 0..3 {
        d.add_worker().await;
    }

    let workers = d.workers().await;
    assert_eq!(workers.len(), 5);
    assert!(workers.iter().all(|w| w.status == WorkerStatus::Wait && w.task.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_remove_busy_worker_lets_task_finish() {
    let d = Dispatcher::new(cfg());
    let worker = d.add_worker().await;
    let finished = Arc::new(AtomicBool::new(false));
    let runs = Arc::new(AtomicUsize::new(0));

    let spec = {
        let finished = Arc::clone(&finished);
        let runs = Arc::clone(&runs);
        TaskSpec::builder("long").build(move |_ctx: TaskContext| {
            let finished = Arc::clone(&finished);
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                time::sleep(Duration::from_millis(100)).await;
                finished.store(true, Ordering::SeqCst);
                Ok::<(), TaskError>(())
            }
        })
    };
    let id = d.add_task(spec).await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(30)).await;
    assert_eq!(d.worker(worker).await.unwrap().status, WorkerStatus::Busy);

    d.remove_worker(worker).await.unwrap();
    assert!(d.workers().await.is_empty());
    assert_eq!(d.task(id).await.unwrap().status, TaskStatus::Kill);
    assert!(!finished.load(Ordering::SeqCst));

    d.add_worker().await;
    time::sleep(Duration::from_millis(200)).await;

    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    let task = d.task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Kill);
    assert_eq!(task.attempts, 0);
    assert_eq!(d.stats().await.workers_total, 1);

    stop(&d, run).await;
}

#[tokio::test(start_paused = true)]
async fn test_locked_busy_worker_is_protected() {
    let d = Dispatcher::new(cfg());
    let worker = d.add_worker().await;
    d.set_worker_locked(worker, true).await.unwrap();
    let starts = Arc::new(Mutex::new(Vec::new()));
    d.add_task(sleeping_task("busy", Duration::from_millis(100), &starts))
        .await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(30)).await;
    assert_eq!(
        d.remove_worker(worker).await,
        Err(DispatcherError::WorkerLocked { id: worker })
    );

    time::sleep(Duration::from_millis(150)).await;
    assert_eq!(d.remove_worker(worker).await, Ok(()));
    assert_eq!(
        d.remove_worker(worker).await,
        Err(DispatcherError::WorkerNotFound { id: worker })
    );
    stop(&d, run).await;
}

#[tokio::test(start_paused = true)]
async fn test_timeout_keeps_worker_until_body_returns() {
    let d = Dispatcher::new(cfg());
    let worker = d.add_worker().await;
    let starts = Arc::new(Mutex::new(Vec::new()));
    let id = d
        .add_task(
            sleeping_task("stuck", Duration::from_millis(200), &starts)
                .with_timeout(Some(Duration::from_millis(50))),
        )
        .await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(100)).await;

    let task = d.task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::FailByTimeout);
    assert_eq!(task.attempts, 1);
    assert_eq!(task.worker, Some(worker));
    assert!(task.last_error.as_deref().is_some_and(|e| e.starts_with("timed out")));
    assert_eq!(d.worker(worker).await.unwrap().status, WorkerStatus::Busy);
    assert_eq!(
        d.remove_task(id).await,
        Err(DispatcherError::TaskInExecution { id })
    );

    time::sleep(Duration::from_millis(200)).await;

    // the late Ok result is discarded
    let task = d.task(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::FailByTimeout);
    assert!(task.worker.is_none());
    assert_eq!(d.worker(worker).await.unwrap().status, WorkerStatus::Wait);

    stop(&d, run).await;
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_repeat_never_overlaps() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    d.add_worker().await;
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let spec = {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        TaskSpec::builder("overrun")
            .with_repeat(RepeatPolicy::Times(2))
            .with_repeat_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_millis(20))
            .build(move |_ctx: TaskContext| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    time::sleep(Duration::from_millis(100)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), TaskError>(())
                }
            })
    };
    let id = d.add_task(spec).await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_secs(1)).await;
    stop(&d, run).await;

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    let task = d.task(id).await.unwrap();
    assert_eq!(task.attempts, 3);
    assert_eq!(task.status, TaskStatus::FailByTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_remove_task_rules() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    let starts = Arc::new(Mutex::new(Vec::new()));
    let running = d
        .add_task(sleeping_task("running", Duration::from_millis(100), &starts).with_priority(9))
        .await;
    let waiting = d
        .add_task(sleeping_task("waiting", Duration::ZERO, &starts))
        .await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(30)).await;

    assert_eq!(
        d.remove_task(running).await,
        Err(DispatcherError::TaskInExecution { id: running })
    );
    assert_eq!(d.remove_task(waiting).await, Ok(()));
    assert_eq!(
        d.remove_task(waiting).await,
        Err(DispatcherError::TaskNotFound { id: waiting })
    );

    time::sleep(Duration::from_millis(200)).await;
    stop(&d, run).await;
    assert_eq!(starts.lock().unwrap().len(), 1);
    // finished tasks can be removed too
    assert_eq!(d.remove_task(running).await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_locked_listener_cannot_be_removed() {
    let hits = Arc::new(AtomicUsize::new(0));
    let guarded = {
        let hits = Arc::clone(&hits);
        Listener::from_fn("guarded", move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    };
    let guarded_id = guarded.id();
    let d = Dispatcher::builder(cfg())
        .with_locked_listener(&[EventKind::TaskAdd], guarded)
        .build();

    assert_eq!(
        d.remove_listener(&[EventKind::TaskAdd], guarded_id).await,
        Err(DispatcherError::ProtectedListener { id: guarded_id })
    );
    assert_eq!(
        d.remove_listener_all(guarded_id).await,
        Err(DispatcherError::ProtectedListener { id: guarded_id })
    );

    let run = spawn_run(&d);
    d.add_task(TaskSpec::builder("t").build(|_ctx: TaskContext| async { Ok::<(), TaskError>(()) }))
        .await;
    time::sleep(Duration::from_millis(50)).await;
    stop(&d, run).await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(d.listener(guarded_id).await.is_some_and(|l| l.locked));
}

#[tokio::test(start_paused = true)]
async fn test_removed_listener_stops_receiving() {
    let d = Dispatcher::new(cfg());
    let hits = Arc::new(AtomicUsize::new(0));
    let id = {
        let hits = Arc::clone(&hits);
        d.add_listener(
            &[EventKind::TaskAdd],
            Listener::from_fn("counter", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap()
    };

    let run = spawn_run(&d);
    let noop = || TaskSpec::builder("noop").build(|_ctx: TaskContext| async { Ok::<(), TaskError>(()) });
    d.add_task(noop()).await;
    time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    d.remove_listener(&[EventKind::TaskAdd], id).await.unwrap();
    assert!(d.listener(id).await.is_none());
    d.add_task(noop()).await;
    time::sleep(Duration::from_millis(50)).await;
    stop(&d, run).await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        d.remove_listener_all(id).await,
        Err(DispatcherError::ListenerNotFound { id })
    );
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_listener_is_rejected() {
    let d = Dispatcher::new(cfg());
    let l = Listener::from_fn("dup", |_| {});
    let id = d.add_listener(&[EventKind::WorkerAdd], l.clone()).await.unwrap();

    assert_eq!(
        d.add_listener(&[EventKind::TaskAdd, EventKind::WorkerAdd], l).await,
        Err(DispatcherError::DuplicateListener { id, kind: EventKind::WorkerAdd })
    );
    assert_eq!(d.listener(id).await.unwrap().events, vec![EventKind::WorkerAdd]);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_listener_does_not_stop_delivery() {
    let d = Dispatcher::new(cfg());
    let bad = d
        .add_listener(
            &[EventKind::TaskAdd],
            Listener::from_fn("bad", |_| panic!("listener failure")),
        )
        .await
        .unwrap();
    let seen = record(&d).await;

    let run = spawn_run(&d);
    let log = Arc::new(Mutex::new(Vec::new()));
    d.add_task(logging_task("first", &log)).await;
    time::sleep(Duration::from_millis(50)).await;
    d.add_task(logging_task("second", &log)).await;
    time::sleep(Duration::from_millis(50)).await;
    stop(&d, run).await;

    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    let adds = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind == EventKind::TaskAdd)
        .count();
    assert_eq!(adds, 2);
    let bad = d.listener(bad).await.unwrap();
    assert_eq!(bad.fires, 2);
    assert_eq!(bad.failures, 2);
}

#[tokio::test(start_paused = true)]
async fn test_events_wait_for_notify_tick() {
    let d = Dispatcher::new(cfg());
    let seen = record(&d).await;
    d.add_worker().await;
    d.add_task(TaskSpec::builder("t").build(|_ctx: TaskContext| async { Ok::<(), TaskError>(()) }))
        .await;

    assert!(seen.lock().unwrap().is_empty());
    assert!(d.stats().await.pending_events > 0);

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(50)).await;
    stop(&d, run).await;

    let events = seen.lock().unwrap();
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(events.iter().any(|e| e.kind == EventKind::WorkerAdd));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_running_tasks() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    let seen = record(&d).await;
    let starts = Arc::new(Mutex::new(Vec::new()));
    let id = d
        .add_task(sleeping_task("slow", Duration::from_millis(500), &starts))
        .await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(50)).await;
    let asked = Instant::now();
    stop(&d, run).await;

    assert!(asked.elapsed() >= Duration::from_millis(400));
    assert_eq!(d.task(id).await.unwrap().status, TaskStatus::Success);
    assert_eq!(d.status().await, DispatcherStatus::Cancel);

    let events = seen.lock().unwrap();
    let last = events
        .iter()
        .rev()
        .find(|e| e.kind == EventKind::DispatcherStatusChanged)
        .unwrap();
    assert_eq!(last.current, Some(crate::events::Status::Dispatcher(DispatcherStatus::Cancel)));
    assert!(events.iter().any(|e| e.kind == EventKind::TaskExecuteStop));
}

#[tokio::test(start_paused = true)]
async fn test_run_only_once() {
    let d = Dispatcher::new(cfg());
    let run = spawn_run(&d);
    time::sleep(TICK).await;

    assert_eq!(d.run().await, Err(DispatcherError::AlreadyRunning));
    stop(&d, run).await;
}

#[tokio::test(start_paused = true)]
async fn test_completed_history_is_bounded() {
    let d = Dispatcher::new(Config {
        completed_capacity: 1,
        ..cfg()
    });
    d.add_worker().await;
    let seen = record(&d).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = d.add_task(logging_task("first", &log)).await;
    let second = d.add_task(logging_task("second", &log)).await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(100)).await;
    stop(&d, run).await;

    let ids: Vec<TaskId> = d.tasks().await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second]);
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.kind == EventKind::TaskRemove && e.task.as_ref().is_some_and(|t| t.id == first)));
}

#[tokio::test(start_paused = true)]
async fn test_start_delay_defers_first_run() {
    let d = Dispatcher::new(cfg());
    d.add_worker().await;
    let starts = Arc::new(Mutex::new(Vec::new()));
    let begin = Instant::now();
    d.add_task(sleeping_task("later", Duration::ZERO, &starts).with_delay(Duration::from_millis(300)))
        .await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(500)).await;
    stop(&d, run).await;

    let starts = starts.lock().unwrap();
    assert_eq!(starts.len(), 1);
    assert!(starts[0] - begin >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_interval_setters_clamp_and_apply() {
    let d = Dispatcher::new(cfg());
    d.set_execute_tasks_interval(Duration::ZERO).await;
    d.set_notify_listeners_interval(Duration::from_millis(40)).await;
    assert_eq!(d.intervals().await, (MIN_TICK, Duration::from_millis(40)));

    d.add_worker().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let run = spawn_run(&d);
    d.add_task(logging_task("quick", &log)).await;
    time::sleep(Duration::from_millis(20)).await;
    stop(&d, run).await;

    assert_eq!(*log.lock().unwrap(), vec!["quick"]);
}

#[tokio::test(start_paused = true)]
async fn test_metadata_and_stats() {
    let d = Dispatcher::new(cfg());
    let worker = d.add_worker().await;
    let starts = Arc::new(Mutex::new(Vec::new()));
    let task = d
        .add_task(sleeping_task("meta", Duration::ZERO, &starts).with_priority(3))
        .await;

    let meta = d.task_metadata(task).await.unwrap();
    assert_eq!(meta[crate::metadata::keys::PRIORITY], 3);
    assert_eq!(meta[crate::metadata::keys::STATUS], "wait");
    assert!(d.worker_metadata(worker).await.is_some());
    assert!(d.task_metadata(TaskId::new()).await.is_none());

    let stats = d.stats().await;
    assert_eq!(stats.status, DispatcherStatus::Wait);
    assert_eq!(stats.workers_total, 1);
    assert_eq!(stats.workers_wait, 1);
    assert_eq!(stats.tasks_total, 1);
    assert_eq!(stats.tasks_by_status["wait"], 1);
    assert_eq!(stats.tasks_by_status["success"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_listener_without_kinds_is_rejected() {
    let d = Dispatcher::new(cfg());
    let ghost = Listener::from_fn("ghost", |_| {});
    let id = ghost.id();

    assert_eq!(
        d.add_listener(&[], ghost).await,
        Err(DispatcherError::NoEventKinds { id })
    );
    assert!(d.listeners().await.is_empty());
    assert!(d.listener_metadata(id).await.is_none());
    let stats = d.stats().await;
    assert_eq!(stats.listeners_total, 0);
    assert_eq!(stats.pending_events, 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_assignment_goes_to_next_idle_worker() {
    let d = Dispatcher::new(cfg());
    // oldest idle slot whose worker loop is gone
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    d.workers.write().await.push(WorkerSlot::new(tx));
    let live = d.add_worker().await;

    let starts = Arc::new(Mutex::new(Vec::new()));
    let id = d
        .add_task(sleeping_task("only", Duration::from_millis(100), &starts))
        .await;
    let begin = Instant::now();

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(5)).await;

    // picked up within the first execute tick
    assert_eq!(d.task(id).await.unwrap().worker, Some(live));
    assert!(starts.lock().unwrap()[0] - begin < TICK);

    time::sleep(Duration::from_millis(200)).await;
    stop(&d, run).await;
    assert_eq!(d.task(id).await.unwrap().status, TaskStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_zero_history_removes_task_after_terminal_status() {
    let d = Dispatcher::new(Config {
        completed_capacity: 0,
        ..cfg()
    });
    d.add_worker().await;
    let seen = record(&d).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let id = d.add_task(logging_task("gone", &log)).await;

    let run = spawn_run(&d);
    time::sleep(Duration::from_millis(100)).await;
    stop(&d, run).await;

    assert_eq!(*log.lock().unwrap(), vec!["gone"]);
    assert!(d.task(id).await.is_none());

    let events = seen.lock().unwrap();
    let of_task: Vec<&Event> = events
        .iter()
        .filter(|e| e.task.as_ref().is_some_and(|t| t.id == id))
        .collect();
    let last_two: Vec<EventKind> = of_task[of_task.len() - 2..].iter().map(|e| e.kind).collect();
    assert_eq!(last_two, vec![EventKind::TaskStatusChanged, EventKind::TaskRemove]);
    assert_eq!(
        of_task[of_task.len() - 2].task_status(),
        Some((TaskStatus::Process, TaskStatus::Success))
    );
}
