//! Source of the daily post topic.

mod google_sheets;

pub use google_sheets::{find_topic, GoogleSheetsTopicSource, ServiceAccountKey};

use crate::retry::{retry_async, RetryPolicy};
use async_trait::async_trait;
use thiserror::Error;

/// Returned when today's date has no row in the content plan.
pub const NO_TOPIC_DEFINED: &str = "No topic defined";
/// Returned when today's row exists but its topic cell is empty.
pub const NO_TOPIC_FOUND: &str = "No topic found";

#[derive(Debug, Error)]
pub enum TopicError {
    /// Transient failure reaching the source.
    #[error("Topic source unavailable: {0}")]
    SourceUnavailable(String),

    /// The credentials are missing, malformed or rejected.
    #[error("Topic source credentials error: {0}")]
    Credentials(String),
}

impl TopicError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TopicError::SourceUnavailable(_))
    }
}

#[async_trait]
pub trait TopicSource: Send + Sync {
    /// Today's topic. Always a string when the source was reachable.
    async fn today_topic(&self) -> Result<String, TopicError>;
}

/// Fetch today's topic, retrying transient failures with `policy`.
pub async fn fetch_topic_with_retry(
    source: &dyn TopicSource,
    policy: &RetryPolicy,
) -> Result<String, TopicError> {
    retry_async(policy, "Topic lookup", TopicError::is_retryable, || {
        source.today_topic()
    })
    .await
    .map_err(|exhausted| exhausted.error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TopicSource for FlakySource {
        async fn today_topic(&self) -> Result<String, TopicError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(TopicError::SourceUnavailable("503".to_string()))
            } else {
                Ok("Protein".to_string())
            }
        }
    }

    struct RejectingSource;

    #[async_trait]
    impl TopicSource for RejectingSource {
        async fn today_topic(&self) -> Result<String, TopicError> {
            Err(TopicError::Credentials("invalid_grant".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let source = FlakySource {
            failures: 3,
            calls: AtomicU32::new(0),
        };

        let topic = fetch_topic_with_retry(&source, &RetryPolicy::topic_lookup())
            .await
            .unwrap();
        assert_eq!(topic, "Protein");
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_credential_errors_are_not_retried() {
        let err = fetch_topic_with_retry(&RejectingSource, &RetryPolicy::topic_lookup())
            .await
            .unwrap_err();
        assert!(matches!(err, TopicError::Credentials(_)));
    }
}
