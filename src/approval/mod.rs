//! The approval workflow engine: session state, its store, the transitions
//! and the routing of inbound events onto them.

pub mod notice;
mod router;
mod session;
mod store;
mod workflow;

pub use router::{route, EventRouter, Route};
pub use session::{
    ApprovalPhase, ApprovalSession, EditEntry, FeedbackTarget, SessionPatch, Transition,
    INITIAL_GENERATION,
};
pub use store::{ApprovalStateStore, EditOutcome, TransitionError};
pub use workflow::{split_chunks, ApprovalWorkflow, WorkflowError, PUBLISH_CHUNK_CHARS};
