use std::time::Duration;

use taskq::{Scheduler, SchedulerConfig, Task, TaskqError};

use crate::helpers::{advance, scheduler, Recorder};

#[tokio::test(start_paused = true)]
async fn higher_priority_runs_first_regardless_of_registration_order() {
    let sched = scheduler(3);
    let rec = Recorder::new();

    sched.register_task(rec.task("p3-a"), 3).unwrap();
    sched.register_task(rec.task("p2-a"), 2).unwrap();
    sched.register_task(rec.task("p1-a"), 1).unwrap();
    sched.register_task(rec.task("p3-b"), 3).unwrap();
    sched.register_task(rec.task("p1-b"), 1).unwrap();
    sched.register_task(rec.task("p2-b"), 2).unwrap();

    sched.execute_all(None, None);
    advance(10).await;

    assert_eq!(
        rec.entries(),
        vec!["p1-a", "p1-b", "p2-a", "p2-b", "p3-a", "p3-b"]
    );
    assert_eq!(sched.pending_count(), 0);
    assert!(!sched.is_running());
}

#[tokio::test(start_paused = true)]
async fn fifo_within_a_level() {
    let sched = scheduler(2);
    let rec = Recorder::new();
    let labels: Vec<String> = (0..20).map(|i| format!("task-{i}")).collect();

    for label in &labels {
        sched.register_task(rec.task(label), 2).unwrap();
    }
    sched.execute_all(None, Some(Duration::from_millis(5)));
    advance(500).await;

    assert_eq!(rec.entries(), labels);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_priority_leaves_queue_untouched() {
    let sched = scheduler(3);
    let rec = Recorder::new();

    let err = sched.register_task(rec.task("too-low"), 4).unwrap_err();
    assert!(matches!(err, TaskqError::OutOfRange { level: 3, max: 2 }));

    let err = sched.register_task(rec.task("zero"), 0).unwrap_err();
    assert!(matches!(err, TaskqError::OutOfRange { level: -1, max: 2 }));

    assert_eq!(sched.pending_count(), 0);
    assert!(sched
        .execute_tasks_with_priority(4, Duration::ZERO, None)
        .is_err());
    assert!(!sched.is_running());
}

#[tokio::test(start_paused = true)]
async fn late_high_priority_work_jumps_ahead_mid_run() {
    let sched = scheduler(3);
    let rec = Recorder::new();

    sched.register_task(rec.task("low-1"), 3).unwrap();
    sched.register_task(rec.task("low-2"), 3).unwrap();
    sched.execute_all(None, Some(Duration::from_millis(100)));

    // low-1 fires at t=100; the next dequeue happens at t=200.
    advance(150).await;
    sched.register_task(rec.task("urgent"), 1).unwrap();
    advance(500).await;

    assert_eq!(rec.entries(), vec!["low-1", "urgent", "low-2"]);
}

#[tokio::test(start_paused = true)]
async fn sustained_high_priority_load_starves_lower_levels() {
    let sched = scheduler(2);
    let rec = Recorder::new();

    sched.register_task(rec.task("background"), 2).unwrap();

    // Each urgent task queues the next one until five have run.
    fn chain(sched: Scheduler, rec: Recorder, n: usize) -> Task {
        Task::new(move || {
            rec.task(&format!("urgent-{n}")).invoke();
            if n < 5 {
                let next = chain(sched.clone(), rec.clone(), n + 1);
                sched.register_task(next, 1).unwrap();
            }
        })
    }
    sched
        .register_task(chain(sched.clone(), rec.clone(), 1), 1)
        .unwrap();

    sched.execute_all(None, None);
    advance(10).await;

    assert_eq!(
        rec.entries(),
        vec!["urgent-1", "urgent-2", "urgent-3", "urgent-4", "urgent-5", "background"]
    );
}

#[tokio::test(start_paused = true)]
async fn level_scoped_run_only_drains_its_level() {
    let sched = scheduler(3);
    let rec = Recorder::new();

    sched.register_task(rec.task("p1"), 1).unwrap();
    sched.register_task(rec.task("p2-a"), 2).unwrap();
    sched.register_task(rec.task("p2-b"), 2).unwrap();
    sched.register_task(rec.task("p3"), 3).unwrap();

    sched
        .execute_tasks_with_priority(2, Duration::ZERO, Some(rec.task("done")))
        .unwrap();
    advance(10).await;

    assert_eq!(rec.entries(), vec!["p2-a", "p2-b", "done"]);
    assert_eq!(sched.pending_at(1).unwrap(), 1);
    assert_eq!(sched.pending_at(2).unwrap(), 0);
    assert_eq!(sched.pending_at(3).unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn auto_run_starts_on_register() {
    let config = SchedulerConfig {
        auto_run: true,
        ..SchedulerConfig::with_levels(2)
    };
    let sched = Scheduler::new(config).unwrap();
    let rec = Recorder::new();

    sched.register_task(rec.task("first"), 2).unwrap();
    assert!(sched.is_running());
    let run = sched.cancel_handle().unwrap().run_id();

    // Joins the run already in flight.
    sched.register_task(rec.task("second"), 1).unwrap();
    assert_eq!(sched.cancel_handle().unwrap().run_id(), run);

    advance(10).await;
    assert_eq!(rec.len(), 2);
    assert_eq!(sched.metrics().runs_started, 1);
}

#[tokio::test(start_paused = true)]
async fn auto_run_picks_up_work_registered_by_completion_callback() {
    let config = SchedulerConfig {
        auto_run: true,
        ..SchedulerConfig::with_levels(2)
    };
    let sched = Scheduler::new(config).unwrap();
    let rec = Recorder::new();

    let done = rec.task("done");
    let follow_up = rec.task("follow-up");
    let inner = sched.clone();
    sched.execute_all(
        Some(Task::new(move || {
            done.invoke();
            inner.register_task(follow_up, 1).unwrap();
        })),
        None,
    );
    advance(1_000).await;

    assert_eq!(rec.entries(), vec!["done", "follow-up"]);
    assert_eq!(sched.pending_count(), 0);
    assert!(!sched.is_running());
}
