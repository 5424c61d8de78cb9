//! Delay-based tasks tracked in a registry so they can be cancelled one by
//! one or all at once.
//!
//! A deferred task only runs if its registry entry is still present when the
//! timer fires, and cancelling removes the entry under the same lock. That
//! pairing is what keeps a task from firing after its cancel returned.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::host::TimerHandle;
use crate::registry::Handle;
use crate::task::{Invoked, Task};

use super::core::{Scheduler, Shared};
use super::handles::DeferredHandle;

pub(super) struct DeferredEntry {
    task: Task,
    timer: Option<TimerHandle>,
}

impl Shared {
    pub(super) fn defer(self: &Arc<Self>, task: Task, delay: Duration) -> Handle {
        let handle = self.lock().deferred.enqueue(DeferredEntry { task, timer: None });

        let weak = Arc::downgrade(self);
        let timer = self.timer.schedule_after(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.fire_deferred(handle);
                }
            }),
        );

        let attached = match self.lock().deferred.get_mut(handle) {
            Some(entry) => {
                entry.timer = Some(timer);
                true
            }
            None => false,
        };
        if !attached {
            // Fired or cancelled before the timer handle could be recorded.
            self.timer.cancel(timer);
        }

        debug!(handle = %handle, timer = %timer, ?delay, "Deferred task scheduled");
        handle
    }

    fn fire_deferred(&self, handle: Handle) {
        let entry = self.lock().deferred.remove(handle);
        let Some(entry) = entry else {
            return;
        };

        debug!(handle = %handle, "Deferred task fired");
        let outcome = entry.task.invoke();
        self.record(|m| {
            m.deferred_fired += 1;
            if outcome == Invoked::Panicked {
                m.task_panics += 1;
            }
        });
    }

    pub(super) fn cancel_deferred(&self, handle: Handle) -> bool {
        let entry = self.lock().deferred.remove(handle);
        let Some(entry) = entry else {
            return false;
        };

        if let Some(timer) = entry.timer {
            self.timer.cancel(timer);
        }
        self.record(|m| m.deferred_cancelled += 1);
        debug!(handle = %handle, "Deferred task cancelled");
        true
    }

    pub(super) fn clear_deferred(&self) -> usize {
        let entries: Vec<_> = self.lock().deferred.drain().collect();
        let count = entries.len();

        for (_, entry) in entries {
            if let Some(timer) = entry.timer {
                self.timer.cancel(timer);
            }
        }
        self.record(|m| m.deferred_cancelled += count as u64);
        count
    }
}

impl Scheduler {
    /// Run `task` once after `delay`.
    ///
    /// The task is tracked until it fires, so [`clear_deferred_tasks`]
    /// and the returned handle can still withdraw it.
    ///
    /// [`clear_deferred_tasks`]: Scheduler::clear_deferred_tasks
    pub fn defer_task(&self, task: impl Into<Task>, delay: Duration) -> DeferredHandle {
        let handle = self.shared.defer(task.into(), delay);
        DeferredHandle::new(&self.shared, handle)
    }

    /// Cancel every deferred task. None of them will run.
    ///
    /// A run waiting on its task-separation delay is stopped as well, since
    /// that delay is itself a deferred task.
    pub fn clear_deferred_tasks(&self) {
        let count = self.shared.clear_deferred();
        info!("Cleared {} deferred tasks", count);
    }
}
