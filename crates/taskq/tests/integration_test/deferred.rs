use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use taskq::Task;

use crate::helpers::{advance, scheduler, Recorder};

#[tokio::test(start_paused = true)]
async fn deferred_task_fires_once_then_leaves_registry() {
    let sched = scheduler(1);
    let fired_at = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    let at = Arc::clone(&fired_at);
    let handle = sched.defer_task(
        Task::new(move || at.lock().unwrap().push(Instant::now())),
        Duration::from_millis(50),
    );
    assert_eq!(sched.deferred_count(), 1);
    assert!(handle.is_pending());

    advance(40).await;
    assert!(fired_at.lock().unwrap().is_empty());

    advance(20).await;
    let fired = fired_at.lock().unwrap().clone();
    assert_eq!(fired.len(), 1);
    assert!(fired[0] - start >= Duration::from_millis(50));
    assert_eq!(sched.deferred_count(), 0);
    assert!(!handle.is_pending());
    assert_eq!(sched.metrics().deferred_fired, 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_after_fire_is_safe() {
    let sched = scheduler(1);
    let rec = Recorder::new();

    let handle = sched.defer_task(rec.task("tick"), Duration::from_millis(5));
    advance(10).await;
    assert_eq!(rec.count("tick"), 1);

    assert!(!handle.cancel());
    assert!(!handle.cancel());
    advance(100).await;
    assert_eq!(rec.count("tick"), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_before_fire_prevents_invocation() {
    let sched = scheduler(1);
    let rec = Recorder::new();

    let handle = sched.defer_task(rec.task("never"), Duration::from_millis(30));
    sched.defer_task(rec.task("later"), Duration::from_millis(60));

    advance(10).await;
    assert!(handle.cancel());
    assert_eq!(sched.deferred_count(), 1);

    advance(100).await;
    assert_eq!(rec.entries(), vec!["later"]);
    assert_eq!(sched.metrics().deferred_cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn zero_delay_cancelled_in_same_tick_never_fires() {
    let sched = scheduler(1);
    let rec = Recorder::new();

    let handle = sched.defer_task(rec.task("racy"), Duration::ZERO);
    assert!(handle.cancel());

    advance(10).await;
    assert!(rec.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn clear_deferred_cancels_everything() {
    let sched = scheduler(1);
    let rec = Recorder::new();

    let handles: Vec<_> = (0..5)
        .map(|i| sched.defer_task(rec.task(&format!("d{i}")), Duration::from_millis(10 * (i + 1))))
        .collect();
    assert_eq!(sched.deferred_count(), 5);

    sched.clear_deferred_tasks();
    assert_eq!(sched.deferred_count(), 0);
    assert!(handles.iter().all(|h| !h.cancel()));

    advance(1_000).await;
    assert!(rec.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn clearing_deferred_stops_a_separated_run() {
    let sched = scheduler(1);
    let rec = Recorder::new();

    sched.register_task(rec.task("a"), 1).unwrap();
    sched.register_task(rec.task("b"), 1).unwrap();
    sched.execute_all(None, Some(Duration::from_millis(100)));

    // "a" runs at t=100; the run is now waiting on its next separation signal.
    advance(150).await;
    assert_eq!(sched.deferred_count(), 1);

    sched.clear_deferred_tasks();
    advance(1_000).await;

    assert_eq!(rec.entries(), vec!["a"]);
    assert_eq!(sched.pending_count(), 1);
    assert!(!sched.is_running());
}

#[tokio::test(start_paused = true)]
async fn deferred_task_can_register_work() {
    let sched = scheduler(2);
    let rec = Recorder::new();

    let inner = sched.clone();
    let queued = rec.clone();
    sched.defer_task(
        Task::new(move || {
            inner.register_task(queued.task("from-timer"), 2).unwrap();
            inner.execute_all(None, None);
        }),
        Duration::from_millis(20),
    );

    advance(50).await;
    assert_eq!(rec.entries(), vec!["from-timer"]);
}
