//! LLM provider abstraction layer.
//!
//! Post text is produced through the [`LlmProvider`] trait so the generation
//! pipeline can be tested without a network backend.

mod openai;
mod provider;
mod types;

pub use openai::{ApiKeySource, OpenAIProvider};
#[cfg(any(test, feature = "mock"))]
pub use provider::MockLlmProvider;
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
