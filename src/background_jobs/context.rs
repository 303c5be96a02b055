use crate::approval::ApprovalStateStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
///
/// Contains references to shared resources and a cancellation token
/// for graceful shutdown handling.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// In-progress approval sessions.
    pub store: Arc<ApprovalStateStore>,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, store: Arc<ApprovalStateStore>) -> Self {
        Self {
            cancellation_token,
            store,
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Same context with a token that is cancelled together with this one.
    pub fn child(&self) -> Self {
        Self {
            cancellation_token: self.cancellation_token.child_token(),
            store: Arc::clone(&self.store),
        }
    }
}
