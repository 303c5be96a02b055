//! Approval session model and its phase state machine.

use crate::messaging::{MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Feedback marker of the first history entry.
pub const INITIAL_GENERATION: &str = "Initial generation";

/// Phase of an approval session.
///
/// `Init` is represented by the absence of a session in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPhase {
    /// Text sent to the approver with Approve / Edit / Cancel.
    TextPending,
    /// The next free-text message from the approver is edit feedback.
    AwaitingFeedback,
    /// Text approved, image review prompt not delivered (yet).
    TextApproved,
    /// Image sent to the approver with Approve / Cancel.
    ImagePending,
    /// Image approved, post is being published.
    Publishing,
    Published, // terminal
    Cancelled, // terminal
}

/// Events that move a session between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    ApproveText,
    RequestEdit,
    SubmitFeedback,
    ImageDelivered,
    ApproveImage,
    Published,
    Cancel,
}

impl ApprovalPhase {
    /// Transition table. Returns `None` for transitions not allowed from `self`.
    pub fn next(self, transition: Transition) -> Option<ApprovalPhase> {
        use ApprovalPhase::*;
        match (self, transition) {
            (TextPending | AwaitingFeedback, Transition::ApproveText) => Some(TextApproved),
            (TextPending | AwaitingFeedback, Transition::RequestEdit) => Some(AwaitingFeedback),
            (AwaitingFeedback, Transition::SubmitFeedback) => Some(TextPending),
            (TextApproved, Transition::ImageDelivered) => Some(ImagePending),
            (TextApproved | ImagePending, Transition::ApproveImage) => Some(Publishing),
            (Publishing, Transition::Published) => Some(Published),
            (TextPending | AwaitingFeedback | TextApproved | ImagePending, Transition::Cancel) => {
                Some(Cancelled)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApprovalPhase::Published | ApprovalPhase::Cancelled)
    }

    pub fn text_approved(&self) -> bool {
        !matches!(
            self,
            ApprovalPhase::TextPending | ApprovalPhase::AwaitingFeedback | ApprovalPhase::Cancelled
        )
    }

    pub fn image_approved(&self) -> bool {
        matches!(self, ApprovalPhase::Publishing | ApprovalPhase::Published)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalPhase::TextPending => "text_pending",
            ApprovalPhase::AwaitingFeedback => "awaiting_feedback",
            ApprovalPhase::TextApproved => "text_approved",
            ApprovalPhase::ImagePending => "image_pending",
            ApprovalPhase::Publishing => "publishing",
            ApprovalPhase::Published => "published",
            ApprovalPhase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ApprovalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::ApproveText => "approve_text",
            Transition::RequestEdit => "request_edit",
            Transition::SubmitFeedback => "submit_feedback",
            Transition::ImageDelivered => "image_delivered",
            Transition::ApproveImage => "approve_image",
            Transition::Published => "published",
            Transition::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// What the approver's next free-text message revises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTarget {
    Text,
}

/// One version of the post text.
#[derive(Debug, Clone, PartialEq)]
pub struct EditEntry {
    pub text: String,
    pub feedback: String,
    pub timestamp: DateTime<Utc>,
}

/// Partial update of the mutable, non-phase fields of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub text_message_id: Option<MessageId>,
    pub image_message_id: Option<MessageId>,
}

impl SessionPatch {
    pub fn text_message(id: MessageId) -> Self {
        Self {
            text_message_id: Some(id),
            ..Default::default()
        }
    }

    pub fn image_message(id: MessageId) -> Self {
        Self {
            image_message_id: Some(id),
            ..Default::default()
        }
    }
}

/// The record tracking one post from generation to publication or cancellation.
#[derive(Debug, Clone)]
pub struct ApprovalSession {
    pub session_id: Uuid,
    pub user_id: UserId,
    pub topic: String,
    pub current_text: String,
    pub image_path: PathBuf,
    pub phase: ApprovalPhase,
    pub created_at: DateTime<Utc>,
    pub text_message_id: Option<MessageId>,
    pub image_message_id: Option<MessageId>,
    pub edit_history: Vec<EditEntry>,
}

impl ApprovalSession {
    /// Create a session whose history holds the initial generation.
    pub fn new(
        user_id: UserId,
        topic: String,
        text: String,
        image_path: PathBuf,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            topic,
            current_text: text.clone(),
            image_path,
            phase: ApprovalPhase::TextPending,
            created_at,
            text_message_id: None,
            image_message_id: None,
            edit_history: vec![EditEntry {
                text,
                feedback: INITIAL_GENERATION.to_string(),
                timestamp: created_at,
            }],
        }
    }

    pub fn text_approved(&self) -> bool {
        self.phase.text_approved()
    }

    pub fn image_approved(&self) -> bool {
        self.phase.image_approved()
    }

    pub fn awaiting_feedback(&self) -> Option<FeedbackTarget> {
        match self.phase {
            ApprovalPhase::AwaitingFeedback => Some(FeedbackTarget::Text),
            _ => None,
        }
    }

    /// The authoritative current text: the last history entry.
    pub fn last_text(&self) -> &str {
        self.edit_history
            .last()
            .map(|entry| entry.text.as_str())
            .unwrap_or(&self.current_text)
    }

    /// Append a revision and make it the current text.
    pub(crate) fn record_edit(&mut self, text: String, feedback: String, at: DateTime<Utc>) {
        self.current_text = text.clone();
        self.edit_history.push(EditEntry {
            text,
            feedback,
            timestamp: at,
        });
    }

    pub(crate) fn apply_patch(&mut self, patch: SessionPatch) {
        if let Some(id) = patch.text_message_id {
            self.text_message_id = Some(id);
        }
        if let Some(id) = patch.image_message_id {
            self.image_message_id = Some(id);
        }
    }

    /// Age measured from creation, not from the last activity.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.created_at >= timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [ApprovalPhase; 7] = [
        ApprovalPhase::TextPending,
        ApprovalPhase::AwaitingFeedback,
        ApprovalPhase::TextApproved,
        ApprovalPhase::ImagePending,
        ApprovalPhase::Publishing,
        ApprovalPhase::Published,
        ApprovalPhase::Cancelled,
    ];

    const ALL_TRANSITIONS: [Transition; 7] = [
        Transition::ApproveText,
        Transition::RequestEdit,
        Transition::SubmitFeedback,
        Transition::ImageDelivered,
        Transition::ApproveImage,
        Transition::Published,
        Transition::Cancel,
    ];

    fn session() -> ApprovalSession {
        ApprovalSession::new(
            42,
            "Hydration".to_string(),
            "Post X".to_string(),
            PathBuf::from("/images/today.png"),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_session_has_initial_history_entry() {
        let session = session();

        assert_eq!(session.phase, ApprovalPhase::TextPending);
        assert_eq!(session.edit_history.len(), 1);
        assert_eq!(session.edit_history[0].text, "Post X");
        assert_eq!(session.edit_history[0].feedback, INITIAL_GENERATION);
        assert_eq!(session.last_text(), "Post X");
        assert!(!session.text_approved());
        assert!(!session.image_approved());
    }

    #[test]
    fn test_happy_path_transitions() {
        let phase = ApprovalPhase::TextPending;
        let phase = phase.next(Transition::RequestEdit).unwrap();
        assert_eq!(phase, ApprovalPhase::AwaitingFeedback);
        let phase = phase.next(Transition::SubmitFeedback).unwrap();
        assert_eq!(phase, ApprovalPhase::TextPending);
        let phase = phase.next(Transition::ApproveText).unwrap();
        assert_eq!(phase, ApprovalPhase::TextApproved);
        let phase = phase.next(Transition::ImageDelivered).unwrap();
        assert_eq!(phase, ApprovalPhase::ImagePending);
        let phase = phase.next(Transition::ApproveImage).unwrap();
        assert_eq!(phase, ApprovalPhase::Publishing);
        let phase = phase.next(Transition::Published).unwrap();
        assert!(phase.is_terminal());
    }

    #[test]
    fn test_image_approval_implies_text_approval() {
        for phase in ALL_PHASES {
            if phase.image_approved() {
                assert!(phase.text_approved(), "{} breaks the invariant", phase);
            }
        }
    }

    #[test]
    fn test_terminal_phases_accept_nothing() {
        for transition in ALL_TRANSITIONS {
            assert_eq!(ApprovalPhase::Published.next(transition), None);
            assert_eq!(ApprovalPhase::Cancelled.next(transition), None);
        }
    }

    #[test]
    fn test_text_approval_is_monotonic() {
        for phase in ALL_PHASES.into_iter().filter(|p| p.text_approved()) {
            for transition in ALL_TRANSITIONS {
                if let Some(next) = phase.next(transition) {
                    if next != ApprovalPhase::Cancelled {
                        assert!(next.text_approved(), "{} -> {} resets approval", phase, next);
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        assert_eq!(ApprovalPhase::TextPending.next(Transition::ApproveImage), None);
        assert_eq!(ApprovalPhase::TextPending.next(Transition::SubmitFeedback), None);
        assert_eq!(ApprovalPhase::ImagePending.next(Transition::ApproveText), None);
        assert_eq!(ApprovalPhase::ImagePending.next(Transition::RequestEdit), None);
        assert_eq!(ApprovalPhase::Publishing.next(Transition::Cancel), None);
    }

    #[test]
    fn test_record_edit_keeps_current_text_in_sync() {
        let mut session = session();
        session.record_edit("Post Y".to_string(), "shorter".to_string(), Utc::now());

        assert_eq!(session.edit_history.len(), 2);
        assert_eq!(session.current_text, "Post Y");
        assert_eq!(session.last_text(), "Post Y");
    }

    #[test]
    fn test_awaiting_feedback_follows_phase() {
        let mut session = session();
        assert_eq!(session.awaiting_feedback(), None);
        session.phase = ApprovalPhase::AwaitingFeedback;
        assert_eq!(session.awaiting_feedback(), Some(FeedbackTarget::Text));
    }

    #[test]
    fn test_expiry_is_measured_from_creation() {
        let session = session();
        let timeout = chrono::Duration::seconds(600);

        assert!(!session.is_expired(session.created_at + chrono::Duration::seconds(599), timeout));
        assert!(session.is_expired(session.created_at + timeout, timeout));
    }
}
