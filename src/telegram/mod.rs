//! Telegram Bot API transport.
//!
//! Two bot identities are used: the approval bot, which converses with the
//! approver and receives updates, and the publisher bot, which is an
//! administrator of the destination channel.

mod client;
mod poller;
mod types;

pub use client::{BotApiClient, ChannelPublisher, TelegramError};
pub use poller::{UpdatePoller, UpdateSource};
pub use types::{
    CallbackQuery, Chat, ChatTarget, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update,
    User,
};
