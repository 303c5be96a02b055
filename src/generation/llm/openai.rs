//! Chat completions client for OpenAI and compatible services.

use super::provider::{CompletionOptions, LlmError, LlmProvider};
use super::types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const KEY_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the bearer token comes from.
#[derive(Debug, Clone)]
pub enum ApiKeySource {
    None,
    Static(String),
    /// Shell command printing the key, run before every request so rotated
    /// keys are picked up.
    Command(String),
}

impl ApiKeySource {
    /// A configured command wins over a static key.
    pub fn from_settings(api_key: Option<String>, api_key_command: Option<String>) -> Self {
        match (api_key, api_key_command) {
            (_, Some(command)) => ApiKeySource::Command(command),
            (Some(key), None) => ApiKeySource::Static(key),
            (None, None) => ApiKeySource::None,
        }
    }

    async fn resolve(&self) -> Result<Option<String>, LlmError> {
        match self {
            ApiKeySource::None => Ok(None),
            ApiKeySource::Static(key) => Ok(Some(key.clone())),
            ApiKeySource::Command(command) => run_key_command(command).await.map(Some),
        }
    }
}

async fn run_key_command(command: &str) -> Result<String, LlmError> {
    debug!("Running api_key_command");
    let output = tokio::time::timeout(
        KEY_COMMAND_TIMEOUT,
        Command::new("sh").arg("-c").arg(command).output(),
    )
    .await
    .map_err(|_| {
        warn!("api_key_command did not finish within {:?}", KEY_COMMAND_TIMEOUT);
        LlmError::Timeout
    })?
    .map_err(|e| LlmError::Connection(format!("Could not run api_key_command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, "api_key_command failed: {}", stderr.trim());
        return Err(LlmError::Connection(format!(
            "api_key_command exited with {}",
            output.status
        )));
    }

    let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if key.is_empty() {
        return Err(LlmError::Connection(
            "api_key_command printed no key".to_string(),
        ));
    }
    Ok(key)
}

pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    model: String,
    key_source: ApiKeySource,
}

impl OpenAIProvider {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        key_source: ApiKeySource,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            key_source,
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        Ok(match self.key_source.resolve().await? {
            Some(key) => request.bearer_auth(key),
            None => request,
        })
    }
}

fn send_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Connection(e.to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: Some(options.temperature),
            max_tokens: options.max_tokens,
        };
        debug!(model = %self.model, messages = messages.len(), "Requesting chat completion");

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .timeout(options.timeout);
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(send_error)?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(LlmError::RateLimited),
            status if !status.is_success() => Err(LlmError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
            _ => response
                .json::<ChatCompletion>()
                .await
                .map_err(|e| LlmError::InvalidResponse(format!("Malformed completion: {}", e)))?
                .into_response(),
        }
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let request = self
            .client
            .get(format!("{}/models", self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT);
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(LlmError::Api {
                status: status.as_u16(),
                message: "model listing failed".to_string(),
            })
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role,
            content: &message.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

impl ChatCompletion {
    fn into_response(self) -> Result<CompletionResponse, LlmError> {
        let usage = self.usage.map(TokenUsage::from);
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("completion without choices".to_string()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::MaxTokens,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            finish_reason,
            usage,
        })
    }
}
