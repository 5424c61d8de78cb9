use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::error::{Result, TaskqError};
use crate::host::{ContentionProbe, NeverContended, Timer, TokioTimer};
use crate::metrics::SchedulerMetrics;
use crate::priority_queue::PriorityQueue;
use crate::registry::HandleRegistry;
use crate::task::Task;

use super::deferred::DeferredEntry;
use super::handles::{ActiveRun, RunHandle, TaskHandle};

/// Whether a top-level run currently owns the scheduler.
#[derive(Debug, Clone, Default)]
pub(super) enum RunState {
    #[default]
    Idle,
    Running(ActiveRun),
}

/// Mutable scheduler state, only touched through [`Shared::lock`].
pub(super) struct Inner {
    pub(super) queue: PriorityQueue<Task>,
    pub(super) deferred: HandleRegistry<DeferredEntry>,
    pub(super) subscriptions: HandleRegistry<Task>,
    pub(super) run: RunState,
    pub(super) metrics: SchedulerMetrics,
}

pub(super) struct Shared {
    pub(super) config: SchedulerConfig,
    pub(super) timer: Arc<dyn Timer>,
    pub(super) probe: Arc<dyn ContentionProbe>,
    pub(super) next_run_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl Shared {
    /// Tasks are never invoked while this guard is held.
    pub(super) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn record(&self, f: impl FnOnce(&mut SchedulerMetrics)) {
        f(&mut self.lock().metrics);
    }

    /// Convert a 1-based external priority into a checked 0-based level.
    pub(super) fn level_for(&self, priority: usize) -> Result<usize> {
        let max = self.config.priority_levels - 1;
        match priority.checked_sub(1) {
            Some(level) if level <= max => Ok(level),
            _ => Err(TaskqError::OutOfRange {
                level: priority as i64 - 1,
                max,
            }),
        }
    }
}

/// Cooperative priority scheduler.
///
/// Cloning is cheap; every clone drives the same queues. Runs and deferred
/// tasks are driven on the Tokio runtime, so the methods that start them
/// must be called from within one.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a scheduler using Tokio timers and a host that is never contended.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::with_host(config, Arc::new(TokioTimer::new()), Arc::new(NeverContended))
    }

    /// Create a scheduler with explicit host capabilities.
    pub fn with_host(
        config: SchedulerConfig,
        timer: Arc<dyn Timer>,
        probe: Arc<dyn ContentionProbe>,
    ) -> Result<Self> {
        config.validate()?;
        let queue = PriorityQueue::new(config.priority_levels)?;
        config.log_summary();

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                timer,
                probe,
                next_run_id: AtomicU64::new(1),
                inner: Mutex::new(Inner {
                    queue,
                    deferred: HandleRegistry::new(),
                    subscriptions: HandleRegistry::new(),
                    run: RunState::Idle,
                    metrics: SchedulerMetrics::default(),
                }),
            }),
        })
    }

    /// Queue `task` at 1-based `priority` (1 is the highest).
    ///
    /// With `auto_run` enabled a full run is started if none is active.
    pub fn register_task(&self, task: impl Into<Task>, priority: usize) -> Result<TaskHandle> {
        let level = self.shared.level_for(priority)?;
        let (handle, idle) = {
            let mut inner = self.shared.lock();
            let handle = inner.queue.enqueue(task.into(), level)?;
            (handle, matches!(inner.run, RunState::Idle))
        };
        debug!(level, handle = %handle, "Registered task");

        if self.shared.config.auto_run && idle {
            self.execute_all(None, None);
        }
        Ok(TaskHandle::new(&self.shared, level, handle))
    }

    /// Drop every queued task and every deferred task.
    ///
    /// Completion subscriptions are kept. An active full run sees its queue
    /// emptied and fires them, including a separated run whose pending
    /// separation delay is withdrawn by this call.
    pub fn clear_pending_tasks(&self) {
        let dropped = {
            let mut inner = self.shared.lock();
            let n = inner.queue.len();
            inner.queue.clear();
            n
        };
        info!("Cleared {} pending tasks", dropped);
        self.clear_deferred_tasks();
    }

    /// Tasks waiting in the priority queue.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Tasks waiting in one 1-based priority level.
    pub fn pending_at(&self, priority: usize) -> Result<usize> {
        let level = self.shared.level_for(priority)?;
        Ok(self.shared.lock().queue.level(level)?.len())
    }

    /// Deferred tasks that have neither fired nor been cancelled.
    pub fn deferred_count(&self) -> usize {
        self.shared.lock().deferred.len()
    }

    /// Completion callbacks waiting for a run to drain.
    pub fn subscription_count(&self) -> usize {
        self.shared.lock().subscriptions.len()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.shared.lock().run, RunState::Running(_))
    }

    /// Cancel handle of the active run, if any.
    pub fn cancel_handle(&self) -> Option<RunHandle> {
        match &self.shared.lock().run {
            RunState::Running(run) => Some(RunHandle::new(&self.shared, run.clone())),
            RunState::Idle => None,
        }
    }

    pub fn priority_levels(&self) -> usize {
        self.shared.config.priority_levels
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Snapshot of the scheduler counters.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.shared.lock().metrics.clone()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Scheduler")
            .field("config", &self.shared.config)
            .field("pending", &inner.queue.len())
            .field("deferred", &inner.deferred.len())
            .field("subscriptions", &inner.subscriptions.len())
            .field("run", &inner.run)
            .finish()
    }
}
