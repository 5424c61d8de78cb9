//! Cooperative priority scheduler.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor, registration, and accessor methods
//! - `execution`: run start/de-duplication and the cooperative drain loop
//! - `deferred`: delay-based tasks and their cancellation
//! - `handles`: cancellation handles handed back to callers
//!
//! A run moves Idle -> Running -> Idle, then drains completion subscriptions.
//! With `auto_run`, work queued while a run was finishing starts the next run.
//! Cancelling its [`RunHandle`] stops it at the next loop check and returns
//! the scheduler to Idle immediately.

mod core;
mod deferred;
mod execution;
mod handles;

pub use self::core::Scheduler;
pub use self::handles::{CancelToken, DeferredHandle, RunHandle, TaskHandle};
