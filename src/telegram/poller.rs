//! Long-polling update loop.

use super::client::{BotApiClient, TelegramError};
use super::types::Update;
use crate::messaging::{EventHandler, InboundEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Source of update batches. Implemented by the Bot API client.
#[async_trait::async_trait]
pub trait UpdateSource: Send + Sync {
    async fn next_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError>;
}

#[async_trait::async_trait]
impl UpdateSource for BotApiClient {
    async fn next_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.get_updates(offset, timeout_secs).await
    }
}

/// Pulls updates and hands each resulting event to the handler on its own task.
///
/// The offset survives reconnects, so updates acknowledged once are never
/// delivered twice.
pub struct UpdatePoller {
    source: Arc<dyn UpdateSource>,
    handler: Arc<dyn EventHandler>,
    poll_timeout_secs: u64,
    offset: Option<i64>,
}

impl UpdatePoller {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        handler: Arc<dyn EventHandler>,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            source,
            handler,
            poll_timeout_secs,
            offset: None,
        }
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Poll until `shutdown` fires or the source fails.
    pub async fn run(&mut self, shutdown: &CancellationToken) -> Result<(), TelegramError> {
        loop {
            let updates = tokio::select! {
                result = self.source.next_updates(self.offset, self.poll_timeout_secs) => result?,
                _ = shutdown.cancelled() => return Ok(()),
            };
            self.dispatch(updates);
        }
    }

    /// Advance the offset past `updates` and spawn a handler task per event.
    pub fn dispatch(&mut self, updates: Vec<Update>) {
        for update in updates {
            self.offset = Some(self.offset.unwrap_or(i64::MIN).max(update.update_id + 1));
            let update_id = update.update_id;
            match update.into_event() {
                Some(event) => self.spawn_handler(event),
                None => debug!(update_id, "Ignoring update without a routable event"),
            }
        }
    }

    fn spawn_handler(&self, event: InboundEvent) {
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            handler.handle(event).await;
        });
    }
}
