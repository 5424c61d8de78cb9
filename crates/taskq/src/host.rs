//! Host capabilities consumed by the scheduler.
//!
//! The scheduler never owns a clock or knows how the host detects main-thread
//! contention. It is handed a [`Timer`] (schedule a callback after a delay,
//! cancel it) and a [`ContentionProbe`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

/// Callback fired by a [`Timer`].
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque identifier for a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Delay capability.
///
/// Implementations must never invoke a callback after `cancel` has returned
/// `true` for its handle. `cancel` on a fired or unknown handle returns `false`.
pub trait Timer: Send + Sync {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    fn cancel(&self, handle: TimerHandle) -> bool;
}

/// Reports whether the host's primary thread is busy.
///
/// Called once per run-loop iteration; must not block.
pub trait ContentionProbe: Send + Sync {
    fn is_contended(&self) -> bool;
}

/// Probe for non-interactive hosts: never contended.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverContended;

impl ContentionProbe for NeverContended {
    fn is_contended(&self) -> bool {
        false
    }
}

/// Probe backed by a flag the host flips when its thread is busy.
#[derive(Debug, Default)]
pub struct FlagProbe {
    contended: AtomicBool,
}

impl FlagProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, contended: bool) {
        self.contended.store(contended, Ordering::SeqCst);
    }
}

impl ContentionProbe for FlagProbe {
    fn is_contended(&self) -> bool {
        self.contended.load(Ordering::SeqCst)
    }
}

type PendingTimers = Arc<Mutex<HashMap<u64, AbortHandle>>>;

/// [`Timer`] backed by `tokio::time::sleep` on spawned tasks.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Default)]
pub struct TokioTimer {
    next_id: AtomicU64,
    pending: PendingTimers,
}

impl TokioTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers scheduled but neither fired nor cancelled.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Timer for TokioTimer {
    fn schedule_after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);

        // Held across spawn + insert so the timer task cannot look itself up
        // before it is registered.
        let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let live = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id)
                .is_some();
            if live {
                callback();
            }
        });
        guard.insert(id, join.abort_handle());

        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let removed = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.0);
        match removed {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        }
    }
}

/// Resolve after `delay` on `timer`.
///
/// Resolves to `false` if the underlying timer is cancelled or its callback
/// is dropped without firing.
pub async fn delay(timer: &dyn Timer, delay: Duration) -> bool {
    let (tx, rx) = oneshot::channel();
    timer.schedule_after(
        delay,
        Box::new(move || {
            let _ = tx.send(());
        }),
    );
    rx.await.is_ok()
}
