//! Post generation and approval bot.
//!
//! A daily topic is turned into post text by a language model, paired with
//! the day's image and sent to a single approver over Telegram. Approved
//! posts are published to a channel.

pub mod approval;
pub mod audit;
pub mod background_jobs;
pub mod config;
pub mod generation;
pub mod images;
pub mod messaging;
pub mod retry;
pub mod supervisor;
pub mod telegram;
pub mod topic;
