//! Post text generation with retries.

use super::llm::{CompletionOptions, LlmError, LlmProvider, Message};
use super::prompts::PromptBuilder;
use crate::retry::{retry_async, Exhausted, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// A language-model call that kept failing.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s): {source}")]
pub struct GenerationError {
    pub operation: &'static str,
    pub attempts: u32,
    #[source]
    pub source: LlmError,
}

/// Produces and revises post text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Write a new post about `topic`, honouring `feedback` first when present.
    async fn generate(&self, topic: &str, feedback: Option<&str>) -> Result<String, GenerationError>;

    /// Apply `feedback` to `text`, keeping its structure and length.
    async fn edit(&self, text: &str, feedback: &str, topic: &str) -> Result<String, GenerationError>;
}

/// [`TextGenerator`] backed by an [`LlmProvider`].
pub struct GenerationPipeline {
    provider: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
    policy: RetryPolicy,
    request_timeout: Duration,
}

impl GenerationPipeline {
    pub fn new(provider: Arc<dyn LlmProvider>, prompts: PromptBuilder) -> Self {
        Self {
            provider,
            prompts,
            policy: RetryPolicy::generation(),
            request_timeout: CompletionOptions::default().timeout,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn generation_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: 0.5,
            max_tokens: Some(550),
            timeout: self.request_timeout,
        }
    }

    fn edit_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: 0.3,
            max_tokens: Some(600),
            timeout: self.request_timeout,
        }
    }

    async fn complete_text(
        &self,
        operation: &'static str,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, GenerationError> {
        let result = retry_async(&self.policy, operation, LlmError::is_retryable, || async {
            let response = self.provider.complete(messages, options).await?;
            let text = response.message.content.trim().to_string();
            if text.is_empty() {
                return Err(LlmError::InvalidResponse("empty completion".to_string()));
            }
            debug!(
                model = self.provider.model(),
                finish_reason = ?response.finish_reason,
                chars = text.chars().count(),
                "{} produced text",
                operation
            );
            Ok(text)
        })
        .await;

        result.map_err(|Exhausted { error, attempts }| GenerationError {
            operation,
            attempts,
            source: error,
        })
    }
}

#[async_trait]
impl TextGenerator for GenerationPipeline {
    async fn generate(&self, topic: &str, feedback: Option<&str>) -> Result<String, GenerationError> {
        info!(topic, with_feedback = feedback.is_some(), "Generating post text");
        let messages = self.prompts.generation_messages(topic, feedback);
        self.complete_text("Text generation", &messages, &self.generation_options())
            .await
    }

    async fn edit(&self, text: &str, feedback: &str, topic: &str) -> Result<String, GenerationError> {
        info!(topic, "Editing post text");
        let messages = self.prompts.edit_messages(text, feedback, topic);
        self.complete_text("Text edit", &messages, &self.edit_options())
            .await
    }
}
