use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::warn;

enum TaskKind {
    Sync(Box<dyn FnOnce() + Send + 'static>),
    Async(BoxFuture<'static, ()>),
}

/// A unit of work the scheduler can invoke exactly once.
///
/// Synchronous tasks run inline on the run loop. Asynchronous tasks are
/// spawned onto the Tokio runtime and never awaited by the scheduler.
pub struct Task(TaskKind);

/// Outcome of invoking a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invoked {
    Completed,
    Spawned,
    Panicked,
}

impl Task {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(TaskKind::Sync(Box::new(f)))
    }

    pub fn from_future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(TaskKind::Async(fut.boxed()))
    }

    pub fn is_async(&self) -> bool {
        matches!(self.0, TaskKind::Async(_))
    }

    /// Run the task. A panic inside a synchronous task is caught and logged
    /// so the caller's loop keeps going.
    ///
    /// Async tasks require a Tokio runtime context.
    pub fn invoke(self) -> Invoked {
        match self.0 {
            TaskKind::Sync(f) => match catch_unwind(AssertUnwindSafe(f)) {
                Ok(()) => Invoked::Completed,
                Err(payload) => {
                    warn!("Task panicked: {}", panic_message(payload.as_ref()));
                    Invoked::Panicked
                }
            },
            TaskKind::Async(fut) => {
                tokio::spawn(fut);
                Invoked::Spawned
            }
        }
    }
}

impl<F> From<F> for Task
where
    F: FnOnce() + Send + 'static,
{
    fn from(f: F) -> Self {
        Task::new(f)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_async() { "async" } else { "sync" };
        f.debug_tuple("Task").field(&kind).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
