use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scheduler operational counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Tasks invoked by a run, keyed by the queue they were drained from.
    pub tasks_executed: BTreeMap<String, u64>,
    /// Synchronous tasks that panicked while being invoked.
    pub task_panics: u64,
    /// Runs started (top-level, level-scoped and subscription drains).
    pub runs_started: u64,
    /// Runs that drained their queue.
    pub runs_completed: u64,
    /// Runs stopped by a cancel or a withdrawn separation signal.
    pub runs_cancelled: u64,
    /// Deferred tasks that fired.
    pub deferred_fired: u64,
    /// Deferred tasks cancelled before firing, individually or by a clear.
    pub deferred_cancelled: u64,
    /// Host-yield pauses taken because of main-thread contention.
    pub host_yields: u64,
    /// When the last run finished, for whatever reason.
    pub last_run_finished: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    /// Record one task invocation drained from `source`.
    pub fn record_execution(&mut self, source: &str, panicked: bool) {
        *self.tasks_executed.entry(source.to_string()).or_default() += 1;
        if panicked {
            self.task_panics += 1;
        }
    }

    pub fn record_run_finished(&mut self, completed: bool) {
        if completed {
            self.runs_completed += 1;
        } else {
            self.runs_cancelled += 1;
        }
        self.last_run_finished = Some(Utc::now());
    }

    /// Total tasks executed across every source.
    pub fn total_executed(&self) -> u64 {
        self.tasks_executed.values().sum()
    }
}
