//! Dispatch of inbound events to workflow transitions.

use super::notice;
use super::session::ApprovalPhase;
use super::store::TransitionError;
use super::workflow::{ApprovalWorkflow, WorkflowError};
use crate::messaging::{ButtonAction, Command, EventHandler, InboundEvent, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do with an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Reply to `/start` with the usage hint.
    Help,
    /// Refuse a non-approver. Commands get a message, button presses an answer.
    Deny(&'static str),
    Generate,
    NoActiveSession,
    Action(ButtonAction),
    /// The button is valid but not in the current phase.
    Unavailable,
    UnknownAction,
    Feedback(String),
    Ignore,
}

/// Decide how to handle `event` given the approver identity and the phase
/// of the sender's session, if any.
pub fn route(event: &InboundEvent, approver_id: UserId, phase: Option<ApprovalPhase>) -> Route {
    match event {
        InboundEvent::Command { sender, command } => {
            if *sender != approver_id {
                return Route::Deny(match command {
                    Command::Start => notice::START_DENIED,
                    Command::Generate => notice::GENERATE_DENIED,
                });
            }
            match command {
                Command::Start => Route::Help,
                Command::Generate => Route::Generate,
            }
        }
        InboundEvent::Callback { sender, data, .. } => {
            if *sender != approver_id {
                return Route::Deny(notice::CALLBACK_DENIED);
            }
            let Some(phase) = phase else {
                return Route::NoActiveSession;
            };
            match ButtonAction::parse(data) {
                Some(action) if action_allowed(phase, action) => Route::Action(action),
                Some(_) => Route::Unavailable,
                None => Route::UnknownAction,
            }
        }
        InboundEvent::Text { sender, text } => {
            if *sender == approver_id && phase == Some(ApprovalPhase::AwaitingFeedback) {
                Route::Feedback(text.clone())
            } else {
                Route::Ignore
            }
        }
    }
}

fn action_allowed(phase: ApprovalPhase, action: ButtonAction) -> bool {
    use ButtonAction::*;
    match phase {
        ApprovalPhase::TextPending | ApprovalPhase::AwaitingFeedback => {
            matches!(action, ApproveText | EditText | Cancel)
        }
        ApprovalPhase::TextApproved => matches!(action, ApproveImage | RetryImage | Cancel),
        ApprovalPhase::ImagePending => matches!(action, ApproveImage | Cancel),
        ApprovalPhase::Publishing | ApprovalPhase::Published | ApprovalPhase::Cancelled => false,
    }
}

/// [`EventHandler`] that routes events for a single approver.
pub struct EventRouter {
    approver_id: UserId,
    workflow: Arc<ApprovalWorkflow>,
}

impl EventRouter {
    pub fn new(approver_id: UserId, workflow: Arc<ApprovalWorkflow>) -> Self {
        Self {
            approver_id,
            workflow,
        }
    }

    pub async fn dispatch(&self, event: InboundEvent) {
        let sender = event.sender();
        // Events from anyone else never reach the store.
        let phase = if sender == self.approver_id {
            self.workflow
                .store()
                .get(sender)
                .await
                .map(|session| session.phase)
        } else {
            None
        };

        let route = route(&event, self.approver_id, phase);
        debug!(sender, ?phase, ?route, "Routing event");

        let callback_id = match &event {
            InboundEvent::Callback { callback_id, .. } => Some(callback_id.as_str()),
            _ => None,
        };

        match route {
            Route::Help => self.reply(sender, notice::START_HELP).await,
            Route::Deny(text) => {
                warn!(sender, "Unauthorized access attempt");
                match callback_id {
                    Some(id) => self.answer(id, text).await,
                    None => self.reply(sender, text).await,
                }
            }
            Route::Generate => {
                if let Err(e) = self.workflow.generate(sender).await {
                    self.workflow
                        .report_failure(sender, "Command failed", &e)
                        .await;
                }
            }
            Route::NoActiveSession => {
                self.answer(callback_id.unwrap_or_default(), notice::NO_ACTIVE_SESSION)
                    .await
            }
            Route::Unavailable => {
                self.answer(callback_id.unwrap_or_default(), notice::ACTION_UNAVAILABLE)
                    .await
            }
            Route::UnknownAction => {
                self.answer(callback_id.unwrap_or_default(), notice::UNKNOWN_ACTION)
                    .await
            }
            Route::Action(action) => {
                let callback_id = callback_id.unwrap_or_default();
                let result = match action {
                    ButtonAction::ApproveText => self.workflow.approve_text(sender, callback_id).await,
                    ButtonAction::EditText => {
                        self.workflow.request_text_edit(sender, callback_id).await
                    }
                    ButtonAction::Cancel => self.workflow.cancel(sender, callback_id).await,
                    ButtonAction::ApproveImage => {
                        self.workflow.approve_image(sender, callback_id).await
                    }
                    ButtonAction::RetryImage => self.workflow.retry_image(sender, callback_id).await,
                };
                match result {
                    Ok(()) => {}
                    // Another event for the same session won the race.
                    Err(WorkflowError::Transition(e)) => {
                        debug!(sender, %action, "Action lost a race: {}", e);
                        let text = match e {
                            TransitionError::NoActiveSession => notice::NO_ACTIVE_SESSION,
                            TransitionError::Invalid { .. } => notice::ACTION_UNAVAILABLE,
                        };
                        self.answer(callback_id, text).await;
                    }
                    Err(e) => {
                        self.workflow
                            .report_failure(sender, "Approval flow error", &e)
                            .await
                    }
                }
            }
            Route::Feedback(text) => {
                if let Err(e) = self.workflow.receive_feedback(sender, &text).await {
                    self.workflow
                        .report_failure(sender, "Editing error", &e)
                        .await;
                }
            }
            Route::Ignore => {}
        }
    }

    async fn reply(&self, chat: UserId, text: &str) {
        if let Err(e) = self.workflow.approver().send_text(chat, text, &[]).await {
            warn!(chat, "Failed to send reply: {}", e);
        }
    }

    async fn answer(&self, callback_id: &str, text: &str) {
        if let Err(e) = self
            .workflow
            .approver()
            .answer_callback(callback_id, Some(text))
            .await
        {
            debug!(callback_id, "Failed to answer callback: {}", e);
        }
    }
}

#[async_trait]
impl EventHandler for EventRouter {
    async fn handle(&self, event: InboundEvent) {
        self.dispatch(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPROVER: UserId = 1001;
    const STRANGER: UserId = 2002;

    fn command(sender: UserId, command: Command) -> InboundEvent {
        InboundEvent::Command { sender, command }
    }

    fn callback(sender: UserId, data: &str) -> InboundEvent {
        InboundEvent::Callback {
            sender,
            callback_id: "cb".to_string(),
            data: data.to_string(),
        }
    }

    fn text(sender: UserId, text: &str) -> InboundEvent {
        InboundEvent::Text {
            sender,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_commands_from_strangers_are_denied() {
        assert_eq!(
            route(&command(STRANGER, Command::Start), APPROVER, None),
            Route::Deny(notice::START_DENIED)
        );
        assert_eq!(
            route(&command(STRANGER, Command::Generate), APPROVER, None),
            Route::Deny(notice::GENERATE_DENIED)
        );
        assert_eq!(
            route(&callback(STRANGER, "approve_text"), APPROVER, None),
            Route::Deny(notice::CALLBACK_DENIED)
        );
    }

    #[test]
    fn test_approver_commands() {
        assert_eq!(route(&command(APPROVER, Command::Start), APPROVER, None), Route::Help);
        assert_eq!(
            route(
                &command(APPROVER, Command::Generate),
                APPROVER,
                Some(ApprovalPhase::ImagePending)
            ),
            Route::Generate
        );
    }

    #[test]
    fn test_callback_without_session() {
        assert_eq!(
            route(&callback(APPROVER, "approve_text"), APPROVER, None),
            Route::NoActiveSession
        );
    }

    #[test]
    fn test_callback_actions_follow_phase() {
        let text_phase = Some(ApprovalPhase::TextPending);
        assert_eq!(
            route(&callback(APPROVER, "approve_text"), APPROVER, text_phase),
            Route::Action(ButtonAction::ApproveText)
        );
        assert_eq!(
            route(&callback(APPROVER, "regenerate_text"), APPROVER, text_phase),
            Route::Action(ButtonAction::EditText)
        );
        assert_eq!(
            route(&callback(APPROVER, "approve_image"), APPROVER, text_phase),
            Route::Unavailable
        );

        let image_phase = Some(ApprovalPhase::ImagePending);
        assert_eq!(
            route(&callback(APPROVER, "approve_image"), APPROVER, image_phase),
            Route::Action(ButtonAction::ApproveImage)
        );
        assert_eq!(
            route(&callback(APPROVER, "approve_text"), APPROVER, image_phase),
            Route::Unavailable
        );
        assert_eq!(
            route(&callback(APPROVER, "retry_image"), APPROVER, image_phase),
            Route::Unavailable
        );
        assert_eq!(
            route(
                &callback(APPROVER, "retry_image"),
                APPROVER,
                Some(ApprovalPhase::TextApproved)
            ),
            Route::Action(ButtonAction::RetryImage)
        );
    }

    #[test]
    fn test_nothing_is_available_while_publishing() {
        for data in ["approve_image", "cancel_approval", "approve_text"] {
            assert_eq!(
                route(&callback(APPROVER, data), APPROVER, Some(ApprovalPhase::Publishing)),
                Route::Unavailable
            );
        }
    }

    #[test]
    fn test_unknown_payload() {
        assert_eq!(
            route(
                &callback(APPROVER, "launch_rockets"),
                APPROVER,
                Some(ApprovalPhase::TextPending)
            ),
            Route::UnknownAction
        );
    }

    #[test]
    fn test_free_text_is_feedback_only_when_awaited() {
        let awaiting = Some(ApprovalPhase::AwaitingFeedback);
        assert_eq!(
            route(&text(APPROVER, "make it shorter"), APPROVER, awaiting),
            Route::Feedback("make it shorter".to_string())
        );
        assert_eq!(
            route(&text(APPROVER, "/shorter please"), APPROVER, awaiting),
            Route::Feedback("/shorter please".to_string())
        );
        assert_eq!(
            route(&text(APPROVER, "hello"), APPROVER, Some(ApprovalPhase::TextPending)),
            Route::Ignore
        );
        assert_eq!(route(&text(APPROVER, "hello"), APPROVER, None), Route::Ignore);
        assert_eq!(route(&text(STRANGER, "hello"), APPROVER, awaiting), Route::Ignore);
    }

    #[test]
    fn test_known_command_is_never_feedback() {
        let event = InboundEvent::from_message(APPROVER, "/generate".to_string());
        assert_eq!(
            route(&event, APPROVER, Some(ApprovalPhase::AwaitingFeedback)),
            Route::Generate
        );
    }
}
