use super::context::JobContext;
use super::job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs registered jobs on their interval until shutdown.
///
/// Each job gets its own task: a failed run never stops the loop, it only
/// changes the delay before the next run.
pub struct JobRunner {
    jobs: Vec<Arc<dyn BackgroundJob>>,
    job_context: JobContext,
    shutdown_token: CancellationToken,
}

impl JobRunner {
    pub fn new(job_context: JobContext) -> Self {
        let shutdown_token = job_context.cancellation_token.clone();
        Self {
            jobs: Vec::new(),
            job_context,
            shutdown_token,
        }
    }

    /// Register a job with the runner.
    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        info!("Registering job {} ({}): {}", job.name(), job.id(), job.description());
        self.jobs.push(job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Spawn one loop per registered job and wait for all of them to stop.
    pub async fn run(self) {
        info!("Starting job runner with {} registered jobs", self.jobs.len());

        let handles: Vec<JoinHandle<()>> = self
            .jobs
            .into_iter()
            .map(|job| {
                let ctx = self.job_context.clone();
                let shutdown = self.shutdown_token.clone();
                tokio::spawn(run_job_loop(job, ctx, shutdown))
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Job loop panicked: {}", e);
            }
        }

        info!("Job runner stopped");
    }
}

/// Run one job: first cycle immediately, then on its interval.
async fn run_job_loop(job: Arc<dyn BackgroundJob>, ctx: JobContext, shutdown: CancellationToken) {
    let JobSchedule::Interval(interval) = job.schedule();

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let delay = match run_once(job.as_ref(), &ctx, &shutdown).await {
            Ok(()) => interval,
            Err(JobError::Cancelled) => break,
            Err(_) => job.retry_delay().unwrap_or(interval),
        };

        debug!("Job {} sleeping for {:?}", job.id(), delay);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    info!("Job {} stopped", job.id());
}

/// Execute a single run of `job`, logging its outcome.
pub async fn run_once(
    job: &dyn BackgroundJob,
    ctx: &JobContext,
    shutdown: &CancellationToken,
) -> Result<(), JobError> {
    let run_ctx = ctx.child();
    let start_time = Instant::now();

    let result = match job.shutdown_behavior() {
        ShutdownBehavior::Cancellable => {
            tokio::select! {
                result = job.execute(&run_ctx) => result,
                _ = shutdown.cancelled() => {
                    run_ctx.cancellation_token.cancel();
                    Err(JobError::Cancelled)
                }
            }
        }
        ShutdownBehavior::WaitForCompletion => job.execute(&run_ctx).await,
    };

    let elapsed: Duration = start_time.elapsed();
    match &result {
        Ok(()) => debug!("Job {} completed in {:?}", job.id(), elapsed),
        Err(JobError::Cancelled) => info!("Job {} was cancelled after {:?}", job.id(), elapsed),
        Err(e) => error!("Job {} failed after {:?}: {}", job.id(), elapsed, e),
    }
    result
}
