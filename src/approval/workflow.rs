//! Approval transitions: initiate, text review, edit loop, image review, publish.
//!
//! Each operation moves the session through the store first and only then
//! talks to the transports, so two events racing on the same session can
//! never both apply.

use super::notice;
use super::session::{ApprovalPhase, ApprovalSession, SessionPatch, Transition};
use super::store::{ApprovalStateStore, EditOutcome, TransitionError};
use crate::audit::SessionAuditLogger;
use crate::generation::{GenerationError, TextGenerator};
use crate::images::ImageSource;
use crate::messaging::{
    ApproverTransport, ChannelTransport, UserId, IMAGE_RETRY_BUTTONS, IMAGE_REVIEW_BUTTONS,
    TEXT_REVIEW_BUTTONS,
};
use crate::retry::{retry_async, Exhausted, RetryPolicy};
use crate::telegram::TelegramError;
use crate::topic::{fetch_topic_with_retry, TopicError, TopicSource};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Longest text message the Bot API accepts, in characters.
pub const PUBLISH_CHUNK_CHARS: usize = 4096;

const CHUNK_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No image found for today")]
    ImageNotFound,

    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Telegram request failed: {0}")]
    Transport(#[from] TelegramError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Drives one approver's post from generation to publication.
pub struct ApprovalWorkflow {
    store: Arc<ApprovalStateStore>,
    generator: Arc<dyn TextGenerator>,
    images: Arc<dyn ImageSource>,
    topics: Arc<dyn TopicSource>,
    approver: Arc<dyn ApproverTransport>,
    channel: Arc<dyn ChannelTransport>,
    topic_policy: RetryPolicy,
    media_policy: RetryPolicy,
    chunk_pause: Duration,
    audit: SessionAuditLogger,
}

impl ApprovalWorkflow {
    pub fn new(
        store: Arc<ApprovalStateStore>,
        generator: Arc<dyn TextGenerator>,
        images: Arc<dyn ImageSource>,
        topics: Arc<dyn TopicSource>,
        approver: Arc<dyn ApproverTransport>,
        channel: Arc<dyn ChannelTransport>,
    ) -> Self {
        Self {
            store,
            generator,
            images,
            topics,
            approver,
            channel,
            topic_policy: RetryPolicy::topic_lookup(),
            media_policy: RetryPolicy::admin_media(),
            chunk_pause: CHUNK_PAUSE,
            audit: SessionAuditLogger::new(),
        }
    }

    pub fn with_topic_policy(mut self, policy: RetryPolicy) -> Self {
        self.topic_policy = policy;
        self
    }

    pub fn with_media_policy(mut self, policy: RetryPolicy) -> Self {
        self.media_policy = policy;
        self
    }

    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    pub fn store(&self) -> &Arc<ApprovalStateStore> {
        &self.store
    }

    pub fn approver(&self) -> &Arc<dyn ApproverTransport> {
        &self.approver
    }

    /// Fetch today's topic and start a new approval session for it.
    pub async fn generate(&self, user_id: UserId) -> Result<(), WorkflowError> {
        let topic = fetch_topic_with_retry(self.topics.as_ref(), &self.topic_policy).await?;
        info!(user_id, topic = %topic, "Fetched today's topic");
        self.initiate(user_id, &topic).await
    }

    /// Generate text for `topic`, pair it with today's image and send it for review.
    ///
    /// Nothing is stored unless both the text and the image are available.
    pub async fn initiate(&self, user_id: UserId, topic: &str) -> Result<(), WorkflowError> {
        self.notify(user_id, notice::GENERATION_STARTED).await;

        let text = self.generator.generate(topic, None).await?;
        let image_path = self
            .images
            .today_image()
            .await
            .ok_or(WorkflowError::ImageNotFound)?;

        let (session, replaced) = self
            .store
            .create(user_id, topic.to_string(), text, image_path)
            .await;
        self.audit.created(&session);
        if let Some(previous) = replaced {
            info!(
                user_id,
                previous = %previous.session_id,
                "Replaced a pending approval session"
            );
            self.audit.replaced(&previous);
            self.notify(user_id, notice::DRAFT_DISCARDED).await;
        }

        let message_id = self
            .approver
            .send_text(
                user_id,
                &notice::generated_text(session.last_text()),
                TEXT_REVIEW_BUTTONS,
            )
            .await?;
        self.store
            .update(user_id, SessionPatch::text_message(message_id))
            .await;
        Ok(())
    }

    pub async fn approve_text(&self, user_id: UserId, callback_id: &str) -> Result<(), WorkflowError> {
        let session = self.transition(user_id, Transition::ApproveText).await?;
        self.answer(callback_id, Some(notice::TEXT_APPROVED)).await;
        self.send_image_prompt(&session).await
    }

    /// Re-send the image review prompt after a failed delivery.
    pub async fn retry_image(&self, user_id: UserId, callback_id: &str) -> Result<(), WorkflowError> {
        let session = self
            .store
            .get(user_id)
            .await
            .ok_or(TransitionError::NoActiveSession)?;
        if session.phase != ApprovalPhase::TextApproved {
            return Err(TransitionError::Invalid {
                from: session.phase,
                transition: Transition::ImageDelivered,
            }
            .into());
        }

        self.answer(callback_id, None).await;
        self.send_image_prompt(&session).await
    }

    /// Swap the review prompt for a request to describe the change.
    pub async fn request_text_edit(
        &self,
        user_id: UserId,
        callback_id: &str,
    ) -> Result<(), WorkflowError> {
        let session = self.transition(user_id, Transition::RequestEdit).await?;
        self.answer(callback_id, Some(notice::AWAITING_FEEDBACK)).await;

        let prompt = notice::edit_prompt(session.last_text());
        if let Some(message_id) = session.text_message_id {
            match self.approver.edit_text(user_id, message_id, &prompt).await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(user_id, message_id, "Failed to edit review prompt in place: {}", e),
            }
        }

        self.approver.send_text(user_id, &prompt, &[]).await?;
        Ok(())
    }

    /// Apply the approver's feedback to the latest text and send the result for review.
    pub async fn receive_feedback(&self, user_id: UserId, feedback: &str) -> Result<(), WorkflowError> {
        let session = self.transition(user_id, Transition::SubmitFeedback).await?;
        self.notify(user_id, notice::EDITING).await;

        let current = session.last_text().to_string();
        let edited = match self.generator.edit(&current, feedback, &session.topic).await {
            Ok(text) => text,
            Err(e) => {
                self.report_failure(user_id, "Editing error", &WorkflowError::from(e))
                    .await;
                // Put the buttons back so another edit can be requested.
                let still_reviewing = self.store.get(user_id).await.is_some_and(|live| {
                    live.session_id == session.session_id && !live.text_approved()
                });
                if still_reviewing {
                    let message_id = self
                        .approver
                        .send_text(user_id, &notice::current_text(&current), TEXT_REVIEW_BUTTONS)
                        .await?;
                    self.store
                        .update(user_id, SessionPatch::text_message(message_id))
                        .await;
                }
                return Ok(());
            }
        };

        match self
            .store
            .append_edit(user_id, session.session_id, edited.clone(), feedback.to_string())
            .await
        {
            EditOutcome::Applied => {}
            EditOutcome::SessionGone => {
                info!(user_id, session_id = %session.session_id, "Session ended while editing, dropping the edited text");
                return Ok(());
            }
            EditOutcome::TextApproved => {
                info!(user_id, session_id = %session.session_id, "Text approved while editing, dropping the edited text");
                self.notify(user_id, notice::EDIT_DROPPED).await;
                return Ok(());
            }
        }
        self.audit
            .edit_applied(session.session_id, user_id, feedback, edited.chars().count());

        let message_id = self
            .approver
            .send_text(user_id, &notice::edited_text(&edited), TEXT_REVIEW_BUTTONS)
            .await?;
        self.store
            .update(user_id, SessionPatch::text_message(message_id))
            .await;
        Ok(())
    }

    /// Publish the latest text with the image. The session ends either way.
    pub async fn approve_image(&self, user_id: UserId, callback_id: &str) -> Result<(), WorkflowError> {
        let session = self.transition(user_id, Transition::ApproveImage).await?;
        self.answer(callback_id, Some(notice::IMAGE_APPROVED)).await;

        match self
            .publish(session.last_text(), Some(&session.image_path))
            .await
        {
            Ok(()) => {
                match self.store.apply(user_id, Transition::Published).await {
                    Ok(published) => {
                        self.audit.transition(&published, Transition::Published);
                        self.audit.published(&published);
                    }
                    Err(e) => warn!(user_id, "Published, but the session moved on: {}", e),
                }
                info!(user_id, session_id = %session.session_id, "Post published");
                self.notify(user_id, notice::PUBLISHED).await;
            }
            Err(e) => {
                error!(user_id, session_id = %session.session_id, "Channel publication failed: {}", e);
                self.audit.publish_failed(&session, &e.to_string());
                self.store.delete_session(user_id, session.session_id).await;
                self.notify(user_id, notice::PUBLISH_FAILED).await;
            }
        }
        Ok(())
    }

    pub async fn cancel(&self, user_id: UserId, callback_id: &str) -> Result<(), WorkflowError> {
        let from = self.store.get(user_id).await.map(|session| session.phase);
        let session = self.transition(user_id, Transition::Cancel).await?;
        self.audit
            .cancelled(&session, from.unwrap_or(ApprovalPhase::TextPending));

        self.answer(callback_id, Some(notice::CANCELLED_ANSWER)).await;
        self.notify(user_id, notice::CANCELLED).await;
        Ok(())
    }

    /// Post to the channel: one photo with the text as caption, or the text
    /// alone split into sequential chunks. Stops at the first error.
    ///
    /// `approve_image` always passes the session image; the chunked branch
    /// serves imageless publication.
    pub async fn publish(&self, text: &str, image: Option<&Path>) -> Result<(), TelegramError> {
        if let Some(path) = image {
            self.channel.post_photo(path, text).await?;
            return Ok(());
        }

        for (index, chunk) in split_chunks(text, PUBLISH_CHUNK_CHARS).iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.chunk_pause).await;
            }
            self.channel.post_text(chunk).await?;
        }
        Ok(())
    }

    /// Log a failed step and tell the approver about it.
    pub async fn report_failure(&self, user_id: UserId, step: &str, error: &WorkflowError) {
        let session_id = self.store.get(user_id).await.map(|s| s.session_id);
        error!(user_id, step, "{}", error);
        self.audit
            .failure(session_id, user_id, step, &error.to_string());

        let text = match error {
            WorkflowError::ImageNotFound => notice::NO_IMAGE_TODAY.to_string(),
            other => notice::warning(step, other),
        };
        self.notify(user_id, &text).await;
    }

    async fn send_image_prompt(&self, session: &ApprovalSession) -> Result<(), WorkflowError> {
        let user_id = session.user_id;
        let result = retry_async(
            &self.media_policy,
            "Admin image send",
            TelegramError::is_retryable,
            || {
                self.approver.send_photo(
                    user_id,
                    &session.image_path,
                    Some(notice::IMAGE_CAPTION),
                    IMAGE_REVIEW_BUTTONS,
                )
            },
        )
        .await;

        match result {
            Ok(message_id) => {
                self.store
                    .update(user_id, SessionPatch::image_message(message_id))
                    .await;
                match self.store.apply(user_id, Transition::ImageDelivered).await {
                    Ok(updated) => self.audit.transition(&updated, Transition::ImageDelivered),
                    Err(e) => debug!(user_id, "Image delivered after the session moved on: {}", e),
                }
                Ok(())
            }
            Err(Exhausted { error, attempts }) => {
                warn!(
                    user_id,
                    attempts,
                    image = %session.image_path.display(),
                    "Failed to send image to approver: {}",
                    error
                );
                self.audit.failure(
                    Some(session.session_id),
                    user_id,
                    "image_send",
                    &error.to_string(),
                );
                self.approver
                    .send_text(user_id, notice::IMAGE_SEND_FAILED, IMAGE_RETRY_BUTTONS)
                    .await?;
                Ok(())
            }
        }
    }

    async fn transition(
        &self,
        user_id: UserId,
        transition: Transition,
    ) -> Result<ApprovalSession, TransitionError> {
        let session = self.store.apply(user_id, transition).await?;
        self.audit.transition(&session, transition);
        Ok(session)
    }

    async fn notify(&self, user_id: UserId, text: &str) {
        if let Err(e) = self.approver.send_text(user_id, text, &[]).await {
            warn!(user_id, "Failed to notify approver: {}", e);
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.approver.answer_callback(callback_id, text).await {
            debug!(callback_id, "Failed to answer callback: {}", e);
        }
    }
}

/// Split `text` into pieces of at most `max_chars` characters.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
