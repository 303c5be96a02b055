use super::context::JobContext;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// When a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSchedule {
    /// First run at startup, then every `Duration`.
    Interval(Duration),
}

/// What shutdown does to a run in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownBehavior {
    /// Dropped as soon as shutdown starts.
    #[default]
    Cancellable,
    /// Shutdown waits for the run to finish.
    WaitForCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Job timed out")]
    Timeout,
}

/// Periodic maintenance work driven by the [`JobRunner`](super::JobRunner).
///
/// A run that notices `ctx.is_cancelled()` should stop with `JobError::Cancelled`.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    /// Stable identifier, used in logs and the audit trail.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schedule(&self) -> JobSchedule;

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    /// Delay before the next run after a failed one.
    ///
    /// `None` keeps the regular schedule.
    fn retry_delay(&self) -> Option<Duration> {
        None
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
