//! Structured audit trail of approval sessions.
//!
//! Every lifecycle step is emitted as a tracing event on the `audit` target,
//! which the binary routes to the append-only audit log file.

use crate::approval::{ApprovalPhase, ApprovalSession, Transition};
use crate::messaging::UserId;
use tracing::{info, warn};
use uuid::Uuid;

pub const AUDIT_TARGET: &str = "audit";

/// Kinds of session audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAuditEvent {
    Created,
    Replaced,
    Transition,
    EditApplied,
    Published,
    PublishFailed,
    Cancelled,
    Expired,
    Failure,
}

impl SessionAuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAuditEvent::Created => "created",
            SessionAuditEvent::Replaced => "replaced",
            SessionAuditEvent::Transition => "transition",
            SessionAuditEvent::EditApplied => "edit_applied",
            SessionAuditEvent::Published => "published",
            SessionAuditEvent::PublishFailed => "publish_failed",
            SessionAuditEvent::Cancelled => "cancelled",
            SessionAuditEvent::Expired => "expired",
            SessionAuditEvent::Failure => "failure",
        }
    }
}

/// Writes session lifecycle events to the audit target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionAuditLogger;

impl SessionAuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn created(&self, session: &ApprovalSession) {
        self.log(
            SessionAuditEvent::Created,
            session.session_id,
            session.user_id,
            &format!(
                "topic={:?} image={}",
                session.topic,
                session.image_path.display()
            ),
        );
    }

    pub fn replaced(&self, previous: &ApprovalSession) {
        self.log(
            SessionAuditEvent::Replaced,
            previous.session_id,
            previous.user_id,
            &format!("phase={} revisions={}", previous.phase, previous.edit_history.len()),
        );
    }

    pub fn transition(&self, session: &ApprovalSession, transition: Transition) {
        self.log(
            SessionAuditEvent::Transition,
            session.session_id,
            session.user_id,
            &format!("{} -> {}", transition, session.phase),
        );
    }

    pub fn edit_applied(&self, session_id: Uuid, user_id: UserId, feedback: &str, chars: usize) {
        self.log(
            SessionAuditEvent::EditApplied,
            session_id,
            user_id,
            &format!("feedback={:?} chars={}", feedback, chars),
        );
    }

    pub fn published(&self, session: &ApprovalSession) {
        self.log(
            SessionAuditEvent::Published,
            session.session_id,
            session.user_id,
            &format!("topic={:?}", session.topic),
        );
    }

    pub fn publish_failed(&self, session: &ApprovalSession, error: &str) {
        self.log_warn(
            SessionAuditEvent::PublishFailed,
            session.session_id,
            session.user_id,
            error,
        );
    }

    pub fn cancelled(&self, session: &ApprovalSession, from: ApprovalPhase) {
        self.log(
            SessionAuditEvent::Cancelled,
            session.session_id,
            session.user_id,
            &format!("from={}", from),
        );
    }

    pub fn expired(&self, session: &ApprovalSession) {
        self.log(
            SessionAuditEvent::Expired,
            session.session_id,
            session.user_id,
            &format!("phase={} created_at={}", session.phase, session.created_at),
        );
    }

    pub fn failure(&self, session_id: Option<Uuid>, user_id: UserId, step: &str, error: &str) {
        warn!(
            target: AUDIT_TARGET,
            event = SessionAuditEvent::Failure.as_str(),
            session_id = session_id.map(|id| id.to_string()).unwrap_or_default(),
            user_id,
            step,
            "{}",
            error
        );
    }

    fn log(&self, event: SessionAuditEvent, session_id: Uuid, user_id: UserId, details: &str) {
        info!(
            target: AUDIT_TARGET,
            event = event.as_str(),
            session_id = %session_id,
            user_id,
            "{}",
            details
        );
    }

    fn log_warn(&self, event: SessionAuditEvent, session_id: Uuid, user_id: UserId, details: &str) {
        warn!(
            target: AUDIT_TARGET,
            event = event.as_str(),
            session_id = %session_id,
            user_id,
            "{}",
            details
        );
    }
}
