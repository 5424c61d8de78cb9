use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::Result;
use crate::host;
use crate::task::{Invoked, Task};

use super::core::{Inner, RunState, Scheduler, Shared};
use super::handles::{ActiveRun, CancelToken, RunHandle};

/// Queue a run drains from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RunTarget {
    /// The whole priority queue, highest level first.
    All,
    /// One 0-based level.
    Level(usize),
    /// Completion callbacks.
    Subscriptions,
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTarget::All => write!(f, "all"),
            RunTarget::Level(level) => write!(f, "level-{level}"),
            RunTarget::Subscriptions => write!(f, "subscriptions"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Drained,
    Stopped,
}

impl Inner {
    fn target_is_empty(&self, target: RunTarget) -> bool {
        match target {
            RunTarget::All => self.queue.is_empty(),
            RunTarget::Level(level) => self.queue.level(level).map_or(true, |r| r.is_empty()),
            RunTarget::Subscriptions => self.subscriptions.is_empty(),
        }
    }

    fn dequeue_from(&mut self, target: RunTarget) -> Option<Task> {
        match target {
            RunTarget::All => self.queue.dequeue(),
            RunTarget::Level(level) => self.queue.level_mut(level).ok()?.dequeue(),
            RunTarget::Subscriptions => self.subscriptions.dequeue(),
        }
    }
}

impl Shared {
    /// Subscribe `on_complete`, then either hand back the active run or
    /// start a new one over `target`.
    fn start_run(
        self: &Arc<Self>,
        target: RunTarget,
        separation: Duration,
        on_complete: Option<Task>,
    ) -> RunHandle {
        let run = {
            let mut inner = self.lock();
            if let Some(task) = on_complete {
                inner.subscriptions.enqueue(task);
            }
            if let RunState::Running(active) = &inner.run {
                debug!(run = active.id, "Run already active, reusing it");
                return RunHandle::new(self, active.clone());
            }

            let run = ActiveRun {
                id: self.next_run_id.fetch_add(1, Ordering::Relaxed),
                token: CancelToken::new(),
            };
            inner.run = RunState::Running(run.clone());
            inner.metrics.runs_started += 1;
            run
        };

        info!(run = run.id, queue = %target, ?separation, "Run started");
        let shared = Arc::clone(self);
        let driven = run.clone();
        tokio::spawn(async move {
            shared.drive(target, separation, driven).await;
        });

        RunHandle::new(self, run)
    }

    /// Drain `target`, go idle, then drain the completion subscriptions.
    ///
    /// The marker is released before the subscriptions run, so a callback
    /// that registers work can start the next run.
    async fn drive(self: Arc<Self>, target: RunTarget, separation: Duration, run: ActiveRun) {
        let outcome = self.run_loop(target, separation, &run.token).await;
        self.record(|m| m.record_run_finished(outcome == RunOutcome::Drained));
        info!(run = run.id, ?outcome, "Run finished");

        if outcome == RunOutcome::Stopped {
            self.release_run(run.id);
            return;
        }
        self.release_and_rearm(run.id);

        let has_subscribers = !self.lock().subscriptions.is_empty();
        if has_subscribers {
            // Fresh token: cancelling the primary run never reaches here.
            self.record(|m| m.runs_started += 1);
            let drain = self
                .run_loop(RunTarget::Subscriptions, Duration::ZERO, &CancelToken::new())
                .await;
            self.record(|m| m.record_run_finished(drain == RunOutcome::Drained));
        }
    }

    /// Release run `id` and, with `auto_run`, start a new run if work was
    /// queued after the drained run last looked at its queue.
    ///
    /// Release and re-check share one lock with `register_task`'s enqueue,
    /// so a registration either sees the scheduler idle or is seen here.
    pub(super) fn release_and_rearm(self: &Arc<Self>, id: u64) {
        let rearm = {
            let mut inner = self.lock();
            if matches!(&inner.run, RunState::Running(active) if active.id == id) {
                inner.run = RunState::Idle;
            }
            self.config.auto_run
                && matches!(inner.run, RunState::Idle)
                && !inner.queue.is_empty()
        };
        if rearm {
            debug!(run = id, "Work queued while finishing, starting another run");
            self.start_run(RunTarget::All, self.config.task_separation(), None);
        }
    }

    /// The cooperative drain loop.
    ///
    /// Each iteration waits for a proceed signal (a yield, or a deferred
    /// task-separation delay), checks cancellation, yields to a contended
    /// host, and otherwise invokes exactly one task without awaiting it.
    async fn run_loop(
        self: &Arc<Self>,
        target: RunTarget,
        separation: Duration,
        token: &CancelToken,
    ) -> RunOutcome {
        let source = target.to_string();
        loop {
            let empty = self.lock().target_is_empty(target);
            if empty {
                return RunOutcome::Drained;
            }

            let proceed = if separation.is_zero() {
                tokio::task::yield_now().await;
                true
            } else {
                self.separation_signal(separation).await
            };
            if token.is_cancelled() {
                return RunOutcome::Stopped;
            }
            if !proceed {
                // Signal withdrawn. A target emptied by the same clear still
                // counts as drained.
                let empty = self.lock().target_is_empty(target);
                return if empty { RunOutcome::Drained } else { RunOutcome::Stopped };
            }

            if self.probe.is_contended() {
                debug!(queue = %source, "Host contended, yielding");
                self.record(|m| m.host_yields += 1);
                host::delay(self.timer.as_ref(), self.config.yield_delay()).await;
                continue;
            }

            let task = self.lock().dequeue_from(target);
            if let Some(task) = task {
                debug!(queue = %source, "Invoking task");
                let outcome = task.invoke();
                self.record(|m| m.record_execution(&source, outcome == Invoked::Panicked));
            }
        }
    }

    /// Deferred task that resolves the returned future after `separation`.
    ///
    /// Resolves to `false` when the deferred task is withdrawn before firing.
    async fn separation_signal(self: &Arc<Self>, separation: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        self.defer(
            Task::new(move || {
                let _ = tx.send(());
            }),
            separation,
        );
        rx.await.is_ok()
    }
}

impl Scheduler {
    /// Run every queued task, highest priority first.
    ///
    /// `on_complete` fires once the queue is drained. If a run is already
    /// active its handle is returned instead of starting a second run; the
    /// callback is still subscribed. `task_separation` defaults to the
    /// configured value.
    pub fn execute_all(
        &self,
        on_complete: Option<Task>,
        task_separation: Option<Duration>,
    ) -> RunHandle {
        let separation = task_separation.unwrap_or_else(|| self.shared.config.task_separation());
        self.shared.start_run(RunTarget::All, separation, on_complete)
    }

    /// Run only the tasks queued at 1-based `priority`.
    ///
    /// Same contract as [`execute_all`](Scheduler::execute_all), scoped to
    /// one level.
    pub fn execute_tasks_with_priority(
        &self,
        priority: usize,
        task_separation: Duration,
        on_complete: Option<Task>,
    ) -> Result<RunHandle> {
        let level = self.shared.level_for(priority)?;
        Ok(self
            .shared
            .start_run(RunTarget::Level(level), task_separation, on_complete))
    }
}
