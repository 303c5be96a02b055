//! Expired approval session eviction.
//!
//! Sessions live at most `approval timeout` from their creation, whatever
//! their phase. This job walks the store on a fixed interval and drops the
//! ones that reached that age.

use crate::audit::SessionAuditLogger;
use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
    JobAuditLogger,
};
use crate::config::ApprovalSettings;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info};

pub struct SessionReaperJob {
    timeout: Duration,
    interval: Duration,
    retry: Duration,
    lock_wait: Duration,
    audit: SessionAuditLogger,
}

impl SessionReaperJob {
    pub fn from_settings(settings: &ApprovalSettings) -> Self {
        Self {
            timeout: settings.timeout,
            interval: settings.reaper_interval,
            retry: settings.reaper_retry,
            lock_wait: settings.lock_wait,
            audit: SessionAuditLogger::new(),
        }
    }
}

#[async_trait]
impl BackgroundJob for SessionReaperJob {
    fn id(&self) -> &'static str {
        "session_reaper"
    }

    fn name(&self) -> &'static str {
        "Session Reaper"
    }

    fn description(&self) -> &'static str {
        "Delete approval sessions older than the approval timeout"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(self.interval)
    }

    fn retry_delay(&self) -> Option<Duration> {
        Some(self.retry)
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let audit = JobAuditLogger::new(self.id());
        let timeout = chrono::Duration::from_std(self.timeout)
            .map_err(|e| JobError::ExecutionFailed(format!("Invalid approval timeout: {}", e)))?;
        let now = Utc::now();

        let expired = match tokio::time::timeout(
            self.lock_wait,
            ctx.store.cleanup_expired_at(now, timeout),
        )
        .await
        {
            Ok(expired) => expired,
            Err(_) => {
                audit.log_failed("timed out waiting for the session store lock", None);
                return Err(JobError::Timeout);
            }
        };

        for session in &expired {
            self.audit.expired(session);
        }

        if expired.is_empty() {
            debug!("No expired approval sessions");
        } else {
            info!("Cleaned up {} expired approval sessions", expired.len());
            audit.log_completed(Some(serde_json::json!({
                "sessions_expired": expired.len(),
            })));
        }

        Ok(())
    }
}
