//! In-process cooperative task scheduler.
//!
//! Tasks are queued at a 1-based priority and drained highest-priority-first,
//! FIFO within a level, by runs that yield to the host between tasks.
//! Deferred tasks fire once after a delay and can be withdrawn at any time
//! before they do.

pub mod config;
pub mod error;
pub mod host;
pub mod metrics;
pub mod priority_queue;
pub mod registry;
pub mod scheduler;
pub mod task;

pub use config::SchedulerConfig;
pub use error::{Result, TaskqError};
pub use host::{ContentionProbe, FlagProbe, NeverContended, Timer, TimerHandle, TokioTimer};
pub use metrics::SchedulerMetrics;
pub use priority_queue::PriorityQueue;
pub use registry::{Handle, HandleRegistry};
pub use scheduler::{CancelToken, DeferredHandle, RunHandle, Scheduler, TaskHandle};
pub use task::{Invoked, Task};
