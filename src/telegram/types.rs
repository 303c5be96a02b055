//! Bot API wire types.

use crate::messaging::{ButtonAction, InboundEvent, MessageId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Convert to an inbound event. Updates the router has no use for yield `None`.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            return Some(InboundEvent::Callback {
                sender: query.from.id,
                callback_id: query.id,
                data: query.data.unwrap_or_default(),
            });
        }

        let message = self.message?;
        let sender = message.from?.id;
        let text = message.text?;
        Some(InboundEvent::from_message(sender, text))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// One button per row. An empty slice yields an empty keyboard, which
    /// removes any buttons when used in an edit.
    pub fn from_actions(actions: &[ButtonAction]) -> Self {
        Self {
            inline_keyboard: actions
                .iter()
                .map(|action| {
                    vec![InlineKeyboardButton {
                        text: action.label().to_string(),
                        callback_data: action.token().to_string(),
                    }]
                })
                .collect(),
        }
    }
}

/// Destination of a message: numeric chat id or public `@username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatTarget {
    Id(i64),
    Username(String),
}

impl From<i64> for ChatTarget {
    fn from(id: i64) -> Self {
        ChatTarget::Id(id)
    }
}

impl ChatTarget {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<i64>() {
            Ok(id) => ChatTarget::Id(id),
            Err(_) => ChatTarget::Username(value.to_string()),
        }
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{}", id),
            ChatTarget::Username(name) => f.write_str(name),
        }
    }
}
