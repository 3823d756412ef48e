//! Callback-scheduling contract.

use std::sync::Arc;
use std::time::Duration;

pub type JobCallback = Arc<dyn Fn() + Send + Sync>;

/// Opaque handle identifying a scheduled job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobHandle(pub u64);

/// Schedules repeating or one-shot callbacks after a duration.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, interval: Duration, repeatable: bool, callback: JobCallback) -> JobHandle;

    /// Cancels a job; `false` when the handle is unknown or already done.
    fn unschedule(&self, job: JobHandle) -> bool;
}
