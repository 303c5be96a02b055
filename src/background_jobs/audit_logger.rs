//! Helper for recording job runs on the audit target.

use crate::audit::AUDIT_TARGET;
use std::time::Instant;
use tracing::{info, warn};

/// Records the start, completion or failure of one job run, with its duration.
pub struct JobAuditLogger {
    job_id: String,
    start_time: Instant,
}

impl JobAuditLogger {
    /// Create a new audit logger for a job.
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            start_time: Instant::now(),
        }
    }

    /// Log that the job has completed successfully.
    pub fn log_completed(&self, details: Option<serde_json::Value>) {
        info!(
            target: AUDIT_TARGET,
            job_id = %self.job_id,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            details = %details.unwrap_or_default(),
            "job completed"
        );
    }

    /// Log that the job has failed.
    pub fn log_failed(&self, error: &str, details: Option<serde_json::Value>) {
        warn!(
            target: AUDIT_TARGET,
            job_id = %self.job_id,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            details = %details.unwrap_or_default(),
            "job failed: {}",
            error
        );
    }
}
