//! Cancellation handles returned to callers.
//!
//! Every handle holds a weak reference to the scheduler; cancelling after
//! the scheduler is gone does nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, info};

use crate::registry::Handle;

use super::core::{RunState, Shared};

/// Cooperative cancellation flag checked by a run loop once per iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identity and token of the run that owns the scheduler.
#[derive(Debug, Clone)]
pub(crate) struct ActiveRun {
    pub(crate) id: u64,
    pub(crate) token: CancelToken,
}

/// Cancels one queued task.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Weak<Shared>,
    level: usize,
    handle: Handle,
}

impl TaskHandle {
    pub(super) fn new(shared: &Arc<Shared>, level: usize, handle: Handle) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            level,
            handle,
        }
    }

    /// Remove the task from its level if it is still queued.
    ///
    /// Returns `false` once the task has been dequeued, cleared or cancelled.
    pub fn cancel(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let removed = shared
            .lock()
            .queue
            .delete(self.handle, self.level)
            .unwrap_or(false);
        if removed {
            debug!(level = self.level, handle = %self.handle, "Cancelled queued task");
        }
        removed
    }

    /// 0-based level the task was queued at.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("level", &self.level)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Cancels one deferred task.
#[derive(Clone)]
pub struct DeferredHandle {
    shared: Weak<Shared>,
    handle: Handle,
}

impl DeferredHandle {
    pub(super) fn new(shared: &Arc<Shared>, handle: Handle) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            handle,
        }
    }

    /// Cancel the host timer and drop the registry entry.
    ///
    /// The task can never run after this returns. Returns `false` if the
    /// task already fired or was cancelled.
    pub fn cancel(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.cancel_deferred(self.handle),
            None => false,
        }
    }

    /// Whether the task is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.lock().deferred.contains(self.handle))
    }
}

impl fmt::Debug for DeferredHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredHandle")
            .field("handle", &self.handle)
            .finish()
    }
}

/// Cancels an execution run.
///
/// Cancellation is cooperative: the run stops at its next check, and a
/// task already invoked always finishes.
#[derive(Clone)]
pub struct RunHandle {
    shared: Weak<Shared>,
    run: ActiveRun,
}

impl RunHandle {
    pub(super) fn new(shared: &Arc<Shared>, run: ActiveRun) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            run,
        }
    }

    /// Stop the run and release the scheduler's active-run slot.
    pub fn cancel(&self) {
        self.run.token.cancel();
        if let Some(shared) = self.shared.upgrade() {
            shared.release_run(self.run.id);
        }
        info!(run = self.run.id, "Run cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.run.token.is_cancelled()
    }

    pub fn run_id(&self) -> u64 {
        self.run.id
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("run", &self.run.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Shared {
    /// Return to idle if run `id` still owns the scheduler.
    pub(super) fn release_run(&self, id: u64) {
        let mut inner = self.lock();
        if matches!(&inner.run, RunState::Running(active) if active.id == id) {
            inner.run = RunState::Idle;
        }
    }
}
