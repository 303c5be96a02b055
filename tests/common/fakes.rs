#![allow(dead_code)]

use async_trait::async_trait;
use postbot_server::generation::llm::LlmError;
use postbot_server::generation::{GenerationError, TextGenerator};
use postbot_server::images::ImageSource;
use postbot_server::messaging::{
    ApproverTransport, ButtonAction, ChannelTransport, MessageId, UserId,
};
use postbot_server::telegram::TelegramError;
use postbot_server::topic::{TopicError, TopicSource};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Everything the approver-side transport was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat: UserId,
        message_id: MessageId,
        text: String,
        buttons: Vec<ButtonAction>,
    },
    Photo {
        chat: UserId,
        message_id: MessageId,
        path: PathBuf,
        caption: Option<String>,
        buttons: Vec<ButtonAction>,
    },
    Edit {
        chat: UserId,
        message_id: MessageId,
        text: String,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

pub struct RecordingApprover {
    log: Mutex<Vec<Sent>>,
    next_message_id: AtomicI64,
    photo_failures: AtomicU32,
    fail_edits: AtomicBool,
}

impl RecordingApprover {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(100),
            photo_failures: AtomicU32::new(0),
            fail_edits: AtomicBool::new(false),
        }
    }

    /// Make the next `count` photo uploads fail with a connection error.
    pub fn fail_photos(&self, count: u32) {
        self.photo_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Texts of sent text messages, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn answers(&self) -> Vec<Option<String>> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Answer { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn photos(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|sent| matches!(sent, Sent::Photo { .. }))
            .collect()
    }

    pub fn edits(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|sent| matches!(sent, Sent::Edit { .. }))
            .collect()
    }

    /// The last message that carried buttons.
    pub fn last_prompt(&self) -> Option<Sent> {
        self.sent().into_iter().rev().find(|sent| match sent {
            Sent::Text { buttons, .. } | Sent::Photo { buttons, .. } => !buttons.is_empty(),
            _ => false,
        })
    }

    fn next_id(&self) -> MessageId {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    fn record(&self, sent: Sent) {
        self.log.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl ApproverTransport for RecordingApprover {
    async fn send_text(
        &self,
        chat: UserId,
        text: &str,
        buttons: &[ButtonAction],
    ) -> Result<MessageId, TelegramError> {
        let message_id = self.next_id();
        self.record(Sent::Text {
            chat,
            message_id,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(message_id)
    }

    async fn send_photo(
        &self,
        chat: UserId,
        path: &Path,
        caption: Option<&str>,
        buttons: &[ButtonAction],
    ) -> Result<MessageId, TelegramError> {
        let failing = self
            .photo_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TelegramError::Connection("upload reset".to_string()));
        }

        let message_id = self.next_id();
        self.record(Sent::Photo {
            chat,
            message_id,
            path: path.to_path_buf(),
            caption: caption.map(str::to_string),
            buttons: buttons.to_vec(),
        });
        Ok(message_id)
    }

    async fn edit_text(
        &self,
        chat: UserId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TelegramError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(TelegramError::Api {
                code: 400,
                description: "Bad Request: message to edit not found".to_string(),
            });
        }
        self.record(Sent::Edit {
            chat,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.record(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelPost {
    Text(String),
    Photo { path: PathBuf, caption: String },
}

pub struct RecordingChannel {
    posts: Mutex<Vec<ChannelPost>>,
    fail: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_posts(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn posts(&self) -> Vec<ChannelPost> {
        self.posts.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), TelegramError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TelegramError::Api {
                code: 403,
                description: "Forbidden: bot is not a member of the channel chat".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for RecordingChannel {
    async fn post_text(&self, text: &str) -> Result<MessageId, TelegramError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        posts.push(ChannelPost::Text(text.to_string()));
        Ok(posts.len() as MessageId)
    }

    async fn post_photo(&self, path: &Path, caption: &str) -> Result<MessageId, TelegramError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        posts.push(ChannelPost::Photo {
            path: path.to_path_buf(),
            caption: caption.to_string(),
        });
        Ok(posts.len() as MessageId)
    }
}

/// Deterministic generator: `"Post about <topic>"`, edits append `[<feedback>]`.
pub struct FakeGenerator {
    fail_edits: AtomicBool,
    edit_gate: Option<Semaphore>,
    edit_calls: Mutex<Vec<(String, String)>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            fail_edits: AtomicBool::new(false),
            edit_gate: None,
            edit_calls: Mutex::new(Vec::new()),
        }
    }

    /// Edits block until [`FakeGenerator::release_edit`] is called.
    pub fn gated() -> Self {
        Self {
            edit_gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn release_edit(&self) {
        if let Some(gate) = &self.edit_gate {
            gate.add_permits(1);
        }
    }

    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    /// `(text, feedback)` of every edit request.
    pub fn edit_calls(&self) -> Vec<(String, String)> {
        self.edit_calls.lock().unwrap().clone()
    }

    pub fn edit_count(&self) -> usize {
        self.edit_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, topic: &str, feedback: Option<&str>) -> Result<String, GenerationError> {
        Ok(match feedback {
            Some(feedback) => format!("Post about {} [{}]", topic, feedback),
            None => format!("Post about {}", topic),
        })
    }

    async fn edit(&self, text: &str, feedback: &str, _topic: &str) -> Result<String, GenerationError> {
        self.edit_calls
            .lock()
            .unwrap()
            .push((text.to_string(), feedback.to_string()));

        if let Some(gate) = &self.edit_gate {
            let permit = gate.acquire().await.map_err(|_| GenerationError {
                operation: "Text edit",
                attempts: 1,
                source: LlmError::Connection("gate closed".to_string()),
            })?;
            permit.forget();
        }

        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(GenerationError {
                operation: "Text edit",
                attempts: 10,
                source: LlmError::Timeout,
            });
        }
        Ok(format!("{} [{}]", text, feedback))
    }
}

pub struct FakeImages {
    image: Mutex<Option<PathBuf>>,
}

impl FakeImages {
    pub fn with_image(path: &str) -> Self {
        Self {
            image: Mutex::new(Some(PathBuf::from(path))),
        }
    }

    pub fn empty() -> Self {
        Self {
            image: Mutex::new(None),
        }
    }

    pub fn remove_image(&self) {
        *self.image.lock().unwrap() = None;
    }
}

#[async_trait]
impl ImageSource for FakeImages {
    async fn today_image(&self) -> Option<PathBuf> {
        self.image.lock().unwrap().clone()
    }
}

pub struct FakeTopics {
    topic: Result<String, String>,
    calls: AtomicU32,
}

impl FakeTopics {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: Ok(topic.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    /// A source whose credentials are rejected.
    pub fn rejecting(reason: &str) -> Self {
        Self {
            topic: Err(reason.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicSource for FakeTopics {
    async fn today_topic(&self) -> Result<String, TopicError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.topic.clone().map_err(TopicError::Credentials)
    }
}
