//! Messaging primitives shared by the approval engine and the bot transport.
//!
//! The engine only talks to the outside world through [`ApproverTransport`]
//! (the bot identity, private chat with the approver) and [`ChannelTransport`]
//! (the publisher identity, destination channel).

use crate::telegram::TelegramError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// Telegram user identity. Private chats share the id of their user.
pub type UserId = i64;

/// Identifier of a sent message, scoped to its chat.
pub type MessageId = i64;

/// Actions behind the inline buttons of approval prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonAction {
    ApproveText,
    EditText,
    Cancel,
    ApproveImage,
    RetryImage,
}

impl ButtonAction {
    /// Callback payload carried by the button.
    pub fn token(&self) -> &'static str {
        match self {
            ButtonAction::ApproveText => "approve_text",
            ButtonAction::EditText => "regenerate_text",
            ButtonAction::Cancel => "cancel_approval",
            ButtonAction::ApproveImage => "approve_image",
            ButtonAction::RetryImage => "retry_image",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ButtonAction::ApproveText => "✅ Approve Text",
            ButtonAction::EditText => "🔄 Edit Text",
            ButtonAction::Cancel => "❌ Cancel",
            ButtonAction::ApproveImage => "✅ Approve Image",
            ButtonAction::RetryImage => "🔁 Retry image",
        }
    }

    pub fn parse(token: &str) -> Option<ButtonAction> {
        match token {
            "approve_text" => Some(ButtonAction::ApproveText),
            "regenerate_text" => Some(ButtonAction::EditText),
            "cancel_approval" => Some(ButtonAction::Cancel),
            "approve_image" => Some(ButtonAction::ApproveImage),
            "retry_image" => Some(ButtonAction::RetryImage),
            _ => None,
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Buttons attached to the text review prompt.
pub const TEXT_REVIEW_BUTTONS: &[ButtonAction] = &[
    ButtonAction::ApproveText,
    ButtonAction::EditText,
    ButtonAction::Cancel,
];

/// Buttons attached to the image review prompt.
pub const IMAGE_REVIEW_BUTTONS: &[ButtonAction] = &[ButtonAction::ApproveImage, ButtonAction::Cancel];

/// Buttons offered after the image review prompt could not be delivered.
pub const IMAGE_RETRY_BUTTONS: &[ButtonAction] = &[ButtonAction::RetryImage, ButtonAction::Cancel];

/// Bot commands understood by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Generate,
}

impl Command {
    /// Parse `/start` or `/generate`, tolerating an `@botname` suffix and trailing arguments.
    pub fn parse(text: &str) -> Option<Command> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(Command::Start),
            "generate" => Some(Command::Generate),
            _ => None,
        }
    }
}

/// An event received from the approver side of the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        sender: UserId,
        command: Command,
    },
    Callback {
        sender: UserId,
        callback_id: String,
        data: String,
    },
    Text {
        sender: UserId,
        text: String,
    },
}

impl InboundEvent {
    /// Classify a plain message. Known commands become `Command`, everything
    /// else (including unknown slash commands) stays free text.
    pub fn from_message(sender: UserId, text: String) -> Self {
        match Command::parse(&text) {
            Some(command) => InboundEvent::Command { sender, command },
            None => InboundEvent::Text { sender, text },
        }
    }

    pub fn sender(&self) -> UserId {
        match self {
            InboundEvent::Command { sender, .. }
            | InboundEvent::Callback { sender, .. }
            | InboundEvent::Text { sender, .. } => *sender,
        }
    }
}

/// Consumer of inbound events, invoked once per event on its own task.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent);
}

/// Conversation with the approving human, on the bot identity.
#[async_trait]
pub trait ApproverTransport: Send + Sync {
    /// Send a text message, one inline button per row.
    async fn send_text(
        &self,
        chat: UserId,
        text: &str,
        buttons: &[ButtonAction],
    ) -> Result<MessageId, TelegramError>;

    /// Upload a photo with an optional caption and inline buttons.
    async fn send_photo(
        &self,
        chat: UserId,
        path: &Path,
        caption: Option<&str>,
        buttons: &[ButtonAction],
    ) -> Result<MessageId, TelegramError>;

    /// Replace the text of a sent message, dropping its buttons.
    async fn edit_text(
        &self,
        chat: UserId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError>;

    /// Acknowledge a button press, optionally showing a short notification.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError>;
}

/// Publication to the destination channel, on the publisher identity.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn post_text(&self, text: &str) -> Result<MessageId, TelegramError>;

    async fn post_photo(&self, path: &Path, caption: &str) -> Result<MessageId, TelegramError>;
}
