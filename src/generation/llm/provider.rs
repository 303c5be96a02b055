//! The seam between text generation and a model backend.

use super::types::{CompletionResponse, Message};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Per-request sampling and timeout settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    /// Completion length cap, `None` for the backend default.
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,
}

impl LlmError {
    /// Client errors other than 408 and 429 will fail again the same way.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => !(400..500).contains(status) || *status == 408,
            _ => true,
        }
    }
}

/// A chat-completion backend.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name for logs, e.g. `openai`.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError>;

    /// Cheap reachability and credentials check, run once at startup.
    async fn health_check(&self) -> Result<(), LlmError>;
}
