//! In-memory store of approval sessions.

use super::session::{ApprovalPhase, ApprovalSession, SessionPatch, Transition};
use crate::messaging::UserId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Why a phase transition could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("No active approval session")]
    NoActiveSession,

    #[error("Transition {transition} is not allowed from phase {from}")]
    Invalid {
        from: ApprovalPhase,
        transition: Transition,
    },
}

/// Result of [`ApprovalStateStore::append_edit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The session was cancelled, expired or replaced while editing.
    SessionGone,
    /// The text was approved while editing.
    TextApproved,
}

/// Thread-safe storage for approval sessions, keyed by approver identity.
///
/// Every operation takes the same lock for constant-time map work and hands
/// out cloned snapshots, so readers never observe a partially-updated session.
/// The lock is never held across network I/O.
pub struct ApprovalStateStore {
    sessions: Mutex<HashMap<UserId, ApprovalSession>>,
}

impl Default for ApprovalStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalStateStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create a session for `user_id`, replacing any existing one.
    ///
    /// The initial generation is recorded in the history together with the
    /// session. Returns the replaced session, if there was one.
    pub async fn create(
        &self,
        user_id: UserId,
        topic: String,
        text: String,
        image_path: PathBuf,
    ) -> (ApprovalSession, Option<ApprovalSession>) {
        let session = ApprovalSession::new(user_id, topic, text, image_path, Utc::now());
        let mut sessions = self.sessions.lock().await;
        let replaced = sessions.insert(user_id, session.clone());
        (session, replaced)
    }

    pub async fn get(&self, user_id: UserId) -> Option<ApprovalSession> {
        self.sessions.lock().await.get(&user_id).cloned()
    }

    /// Set the fields present in `patch`. No-op if the session is absent.
    pub async fn update(&self, user_id: UserId, patch: SessionPatch) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&user_id) {
            Some(session) => {
                session.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    pub async fn delete(&self, user_id: UserId) -> Option<ApprovalSession> {
        self.sessions.lock().await.remove(&user_id)
    }

    /// Delete the session of `user_id` only if it is still `session_id`.
    pub async fn delete_session(&self, user_id: UserId, session_id: Uuid) -> Option<ApprovalSession> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(&user_id) {
            Some(session) if session.session_id == session_id => sessions.remove(&user_id),
            _ => None,
        }
    }

    /// Append a revision to the history of session `session_id` and make it
    /// the current text.
    ///
    /// Refused when the user now holds a different session (or none), so an
    /// edit finishing after a cancel or a new `/generate` never leaks into
    /// another session. Also refused once the text has been approved.
    pub async fn append_edit(
        &self,
        user_id: UserId,
        session_id: Uuid,
        text: String,
        feedback: String,
    ) -> EditOutcome {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&user_id) {
            Some(session) if session.session_id != session_id => EditOutcome::SessionGone,
            Some(session) if session.text_approved() => EditOutcome::TextApproved,
            Some(session) => {
                session.record_edit(text, feedback, Utc::now());
                EditOutcome::Applied
            }
            None => EditOutcome::SessionGone,
        }
    }

    pub async fn last_text(&self, user_id: UserId) -> Option<String> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&user_id)
            .map(|session| session.last_text().to_string())
    }

    /// Atomically check and apply a phase transition.
    ///
    /// Returns the session snapshot after the transition. Sessions reaching a
    /// terminal phase are removed from the store.
    pub async fn apply(
        &self,
        user_id: UserId,
        transition: Transition,
    ) -> Result<ApprovalSession, TransitionError> {
        let mut sessions = self.sessions.lock().await;
        let from = sessions
            .get(&user_id)
            .map(|session| session.phase)
            .ok_or(TransitionError::NoActiveSession)?;
        let next = from
            .next(transition)
            .ok_or(TransitionError::Invalid { from, transition })?;

        if next.is_terminal() {
            let mut session = sessions
                .remove(&user_id)
                .ok_or(TransitionError::NoActiveSession)?;
            session.phase = next;
            return Ok(session);
        }

        let session = sessions
            .get_mut(&user_id)
            .ok_or(TransitionError::NoActiveSession)?;
        session.phase = next;
        Ok(session.clone())
    }

    /// Remove every session whose age reached `timeout`, returning the removed ones.
    pub async fn cleanup_expired_at(
        &self,
        now: DateTime<Utc>,
        timeout: chrono::Duration,
    ) -> Vec<ApprovalSession> {
        let mut sessions = self.sessions.lock().await;
        let expired: Vec<UserId> = sessions
            .iter()
            .filter(|(_, session)| session.is_expired(now, timeout))
            .map(|(user_id, _)| *user_id)
            .collect();

        expired
            .into_iter()
            .filter_map(|user_id| sessions.remove(&user_id))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
