//! Minimal Telegram Bot API client.

use super::types::{ApiResponse, ChatTarget, InlineKeyboardMarkup, Message, Update, User};
use crate::messaging::{ApproverTransport, ButtonAction, ChannelTransport, MessageId, UserId};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Slack on top of the long-poll timeout before the request itself times out.
const POLL_TIMEOUT_SLACK: Duration = Duration::from_secs(10);
const DEFAULT_FLOOD_WAIT_SECS: u64 = 5;

/// Errors that can occur when calling the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("Flood control, retry after {retry_after}s")]
    FloodWait { retry_after: u64 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelegramError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TelegramError::Connection(_) | TelegramError::Timeout | TelegramError::FloodWait { .. } => {
                true
            }
            TelegramError::Api { code, .. } => *code >= 500,
            TelegramError::InvalidResponse(_) | TelegramError::Io(_) => false,
        }
    }

    /// The message markup was rejected by the formatting parser.
    pub fn is_markup_error(&self) -> bool {
        matches!(
            self,
            TelegramError::Api { code: 400, description } if description.contains("can't parse entities")
        )
    }

    fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TelegramError::Timeout
        } else {
            TelegramError::Connection(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a ChatTarget,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessageTextRequest<'a> {
    chat_id: &'a ChatTarget,
    message_id: MessageId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    reply_markup: InlineKeyboardMarkup,
}

#[derive(Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Serialize)]
struct GetUpdatesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

/// Bot API client bound to one bot token.
pub struct BotApiClient {
    client: Client,
    endpoint: String,
    parse_mode: Option<String>,
}

impl BotApiClient {
    pub fn new(api_base_url: &str, token: &str, parse_mode: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/bot{}", api_base_url.trim_end_matches('/'), token),
            parse_mode,
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }

    async fn call<T, B>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, TelegramError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.url(method))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(TelegramError::from_send)?;
        Self::decode(method, response).await
    }

    async fn call_multipart<T: DeserializeOwned>(
        &self,
        method: &str,
        form: Form,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(self.url(method))
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(TelegramError::from_send)?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, TelegramError> {
        let status = response.status();
        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            TelegramError::InvalidResponse(format!("{} ({}): {}", method, status, e))
        })?;
        into_result(body, status.as_u16())
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        let timeout = Duration::from_secs(timeout_secs) + POLL_TIMEOUT_SLACK;
        self.call("getUpdates", &request, timeout).await
    }

    /// Send a text message, falling back to plain text once if the markup is rejected.
    pub async fn send_message(
        &self,
        chat_id: &ChatTarget,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message, TelegramError> {
        let mut request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: self.parse_mode.as_deref(),
            reply_markup,
        };
        let first = self.call("sendMessage", &request, REQUEST_TIMEOUT).await;
        match first {
            Err(e) if e.is_markup_error() && request.parse_mode.is_some() => {
                warn!(chat = %chat_id, "Markup rejected, resending as plain text: {}", e);
                request.parse_mode = None;
                self.call("sendMessage", &request, REQUEST_TIMEOUT).await
            }
            other => other,
        }
    }

    /// Upload a photo, falling back to a plain caption once if the markup is rejected.
    pub async fn send_photo(
        &self,
        chat_id: &ChatTarget,
        path: &Path,
        caption: Option<&str>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message, TelegramError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let markup = reply_markup
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| TelegramError::InvalidResponse(format!("Invalid reply markup: {}", e)))?;

        let build_form = |parse_mode: Option<&str>| {
            let mut form = Form::new()
                .text("chat_id", chat_id.to_string())
                .part("photo", Part::bytes(bytes.clone()).file_name(file_name.clone()));
            if let Some(caption) = caption {
                form = form.text("caption", caption.to_string());
                if let Some(mode) = parse_mode {
                    form = form.text("parse_mode", mode.to_string());
                }
            }
            if let Some(markup) = &markup {
                form = form.text("reply_markup", markup.clone());
            }
            form
        };

        let parse_mode = self.parse_mode.as_deref();
        debug!(chat = %chat_id, file = %file_name, "Uploading photo");
        let first = self.call_multipart("sendPhoto", build_form(parse_mode)).await;
        match first {
            Err(e) if e.is_markup_error() && parse_mode.is_some() => {
                warn!(chat = %chat_id, "Caption markup rejected, resending as plain text: {}", e);
                self.call_multipart("sendPhoto", build_form(None)).await
            }
            other => other,
        }
    }

    /// Replace the text of a message and drop its inline keyboard.
    pub async fn edit_message_text(
        &self,
        chat_id: &ChatTarget,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError> {
        let mut request = EditMessageTextRequest {
            chat_id,
            message_id,
            text,
            parse_mode: self.parse_mode.as_deref(),
            reply_markup: InlineKeyboardMarkup::from_actions(&[]),
        };
        // The result is the edited message, or `true` for inline messages.
        let result: Result<serde_json::Value, _> =
            self.call("editMessageText", &request, REQUEST_TIMEOUT).await;
        match result {
            Err(e) if e.is_markup_error() && request.parse_mode.is_some() => {
                request.parse_mode = None;
                self.call::<serde_json::Value, _>("editMessageText", &request, REQUEST_TIMEOUT)
                    .await
                    .map(|_| ())
            }
            other => other.map(|_| ()),
        }
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id,
            text,
        };
        let _: bool = self
            .call("answerCallbackQuery", &request, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }
}

fn into_result<T>(body: ApiResponse<T>, http_status: u16) -> Result<T, TelegramError> {
    if body.ok {
        return body
            .result
            .ok_or_else(|| TelegramError::InvalidResponse("ok response without result".to_string()));
    }

    let code = body.error_code.unwrap_or(http_status);
    if code == 429 {
        let retry_after = body
            .parameters
            .and_then(|p| p.retry_after)
            .unwrap_or(DEFAULT_FLOOD_WAIT_SECS);
        return Err(TelegramError::FloodWait { retry_after });
    }
    Err(TelegramError::Api {
        code,
        description: body.description.unwrap_or_default(),
    })
}

fn keyboard(buttons: &[ButtonAction]) -> Option<InlineKeyboardMarkup> {
    if buttons.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::from_actions(buttons))
    }
}

#[async_trait]
impl ApproverTransport for BotApiClient {
    async fn send_text(
        &self,
        chat: UserId,
        text: &str,
        buttons: &[ButtonAction],
    ) -> Result<MessageId, TelegramError> {
        let markup = keyboard(buttons);
        let message = self
            .send_message(&ChatTarget::Id(chat), text, markup.as_ref())
            .await?;
        Ok(message.message_id)
    }

    async fn send_photo(
        &self,
        chat: UserId,
        path: &Path,
        caption: Option<&str>,
        buttons: &[ButtonAction],
    ) -> Result<MessageId, TelegramError> {
        let markup = keyboard(buttons);
        let message =
            BotApiClient::send_photo(self, &ChatTarget::Id(chat), path, caption, markup.as_ref())
                .await?;
        Ok(message.message_id)
    }

    async fn edit_text(
        &self,
        chat: UserId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.edit_message_text(&ChatTarget::Id(chat), message_id, text)
            .await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.answer_callback_query(callback_id, text).await
    }
}

/// Posts to the destination channel through the publisher bot.
pub struct ChannelPublisher {
    client: BotApiClient,
    channel: ChatTarget,
}

impl ChannelPublisher {
    pub fn new(client: BotApiClient, channel: ChatTarget) -> Self {
        Self { client, channel }
    }

    pub fn client(&self) -> &BotApiClient {
        &self.client
    }
}

#[async_trait]
impl ChannelTransport for ChannelPublisher {
    async fn post_text(&self, text: &str) -> Result<MessageId, TelegramError> {
        let message = self.client.send_message(&self.channel, text, None).await?;
        Ok(message.message_id)
    }

    async fn post_photo(&self, path: &Path, caption: &str) -> Result<MessageId, TelegramError> {
        let message = self
            .client
            .send_photo(&self.channel, path, Some(caption), None)
            .await?;
        Ok(message.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: DeserializeOwned>(json: &str) -> ApiResponse<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_ok_response_yields_result() {
        let body: ApiResponse<bool> = parse(r#"{"ok": true, "result": true}"#);
        assert!(into_result(body, 200).unwrap());
    }

    #[test]
    fn test_flood_wait_is_detected() {
        let body: ApiResponse<bool> = parse(
            r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 17", "parameters": {"retry_after": 17}}"#,
        );
        let err = into_result(body, 429).unwrap_err();
        assert!(matches!(err, TelegramError::FloodWait { retry_after: 17 }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_markup_error_is_detected() {
        let body: ApiResponse<bool> = parse(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: can't parse entities: Can't find end of the entity starting at byte offset 12"}"#,
        );
        let err = into_result(body, 400).unwrap_err();
        assert!(err.is_markup_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_code_falls_back_to_http_status() {
        let body: ApiResponse<bool> = parse(r#"{"ok": false, "description": "Bad Gateway"}"#);
        let err = into_result(body, 502).unwrap_err();
        assert!(matches!(err, TelegramError::Api { code: 502, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_endpoint_layout() {
        let client = BotApiClient::new("https://api.telegram.org/", "123:abc", None);
        assert_eq!(
            client.url("getMe"),
            "https://api.telegram.org/bot123:abc/getMe"
        );
    }

    #[test]
    fn test_empty_button_list_has_no_keyboard() {
        assert!(keyboard(&[]).is_none());
        assert_eq!(
            keyboard(&[ButtonAction::Cancel])
                .unwrap()
                .inline_keyboard
                .len(),
            1
        );
    }

    #[test]
    fn test_send_message_request_skips_missing_fields() {
        let target = ChatTarget::Id(42);
        let request = SendMessageRequest {
            chat_id: &target,
            text: "hi",
            parse_mode: None,
            reply_markup: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": 42, "text": "hi"}));
    }
}
