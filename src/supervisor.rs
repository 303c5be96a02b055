//! Keeps the update stream alive.
//!
//! Every (re)connect verifies both bot identities, then polls until the
//! stream fails. Failures never stop the loop, only shutdown does.

use crate::messaging::EventHandler;
use crate::retry::RetryPolicy;
use crate::telegram::{BotApiClient, ChannelPublisher, TelegramError, UpdatePoller, UpdateSource, User};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Extra wait added to a flood-control delay.
const FLOOD_WAIT_MARGIN_SECS: u64 = 5;
const FLOOD_WAIT_MAX_SECS: u64 = 300;
/// Delay after failures that are neither flood control nor connectivity.
const BASE_DELAY: Duration = Duration::from_secs(10);

/// A bot account whose credentials can be checked.
#[async_trait]
pub trait BotIdentity: Send + Sync {
    async fn identify(&self) -> Result<User, TelegramError>;
}

#[async_trait]
impl BotIdentity for BotApiClient {
    async fn identify(&self) -> Result<User, TelegramError> {
        self.get_me().await
    }
}

#[async_trait]
impl BotIdentity for ChannelPublisher {
    async fn identify(&self) -> Result<User, TelegramError> {
        self.client().get_me().await
    }
}

/// Consecutive-failure bookkeeping for reconnect delays.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(RetryPolicy::reconnect())
    }
}

impl ReconnectBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, failures: 0 }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Delay before reconnecting after `error`.
    pub fn delay_after(&mut self, error: &TelegramError) -> Duration {
        match error {
            TelegramError::FloodWait { retry_after } => Duration::from_secs(
                (retry_after + FLOOD_WAIT_MARGIN_SECS).min(FLOOD_WAIT_MAX_SECS),
            ),
            TelegramError::Connection(_) | TelegramError::Timeout => {
                self.failures = self.failures.saturating_add(1);
                self.policy.backoff(self.failures)
            }
            _ => BASE_DELAY,
        }
    }
}

pub struct ConnectionSupervisor {
    updates: Arc<dyn UpdateSource>,
    handler: Arc<dyn EventHandler>,
    identities: Vec<(&'static str, Arc<dyn BotIdentity>)>,
    poll_timeout_secs: u64,
    backoff: ReconnectBackoff,
}

impl ConnectionSupervisor {
    pub fn new(
        updates: Arc<dyn UpdateSource>,
        handler: Arc<dyn EventHandler>,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            updates,
            handler,
            identities: Vec::new(),
            poll_timeout_secs,
            backoff: ReconnectBackoff::default(),
        }
    }

    /// Check `identity` on every connect, logging it as `role`.
    pub fn with_identity(mut self, role: &'static str, identity: Arc<dyn BotIdentity>) -> Self {
        self.identities.push((role, identity));
        self
    }

    pub fn with_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run until `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        // One poller for the whole run so the update offset survives reconnects.
        let mut poller = UpdatePoller::new(
            Arc::clone(&self.updates),
            Arc::clone(&self.handler),
            self.poll_timeout_secs,
        );

        while !shutdown.is_cancelled() {
            let error = match self.session(&mut poller, &shutdown).await {
                Ok(()) => break,
                Err(e) => e,
            };

            let delay = self.backoff.delay_after(&error);
            match &error {
                TelegramError::FloodWait { .. } => {
                    warn!("Flood control: sleeping {}s", delay.as_secs())
                }
                TelegramError::Connection(_) | TelegramError::Timeout => error!(
                    "Connection failure #{}: {}. Reconnecting in {}s",
                    self.backoff.failures(),
                    error,
                    delay.as_secs()
                ),
                _ => error!(
                    "Update stream failed: {}. Restarting in {}s",
                    error,
                    delay.as_secs()
                ),
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Connection supervisor stopped");
    }

    async fn session(
        &mut self,
        poller: &mut UpdatePoller,
        shutdown: &CancellationToken,
    ) -> Result<(), TelegramError> {
        for (role, identity) in &self.identities {
            let me = identity.identify().await?;
            info!(
                "{} bot connected as @{} ({})",
                role,
                me.username.as_deref().unwrap_or(&me.first_name),
                me.id
            );
        }
        self.backoff.reset();
        poller.run(shutdown).await
    }
}
