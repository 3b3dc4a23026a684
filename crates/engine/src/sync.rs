//! Remote synchronization
//!
//! Every call into the authority is bounded by the request timeout; an
//! expired call becomes `TransientNetwork` and is abandoned. Played reports
//! and refreshes are fire-and-forget: they run on spawned tasks and deliver
//! their result back to the control loop as a [`SyncEvent`], so a slow link
//! never stalls distance accumulation or triggering.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cheerline_core::{Error, Message, MessageId, Result, Run, RunId};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::AuthorityClient;
use crate::config::EngineConfig;

/// Exponential backoff with jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based). Doubles per attempt up
    /// to the ceiling; the upper half of that window is randomized.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ceiling = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        let half = ceiling / 2;
        let jitter_ms = half.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        (ceiling - half) + jitter
    }
}

/// Result of a background sync call
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A played report finished
    Reported {
        /// The message reported
        message_id: MessageId,
        /// 1-based attempt number
        attempt: u32,
        /// Outcome
        result: Result<()>,
    },
    /// A message-list refresh finished
    Refreshed(Result<Vec<Message>>),
}

/// Client-side view of one run on the authority
pub struct SyncClient {
    client: Arc<dyn AuthorityClient>,
    run_id: RunId,
    request_timeout: Duration,
    retry: RetryPolicy,
    refresh_attempts: u32,
    events: mpsc::UnboundedSender<SyncEvent>,
}

/// Bound a remote call by `limit`
pub async fn bounded<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::TransientNetwork(format!(
            "request timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

impl SyncClient {
    /// Create a sync client for `run_id`; background results go to `events`
    pub fn new(
        client: Arc<dyn AuthorityClient>,
        run_id: RunId,
        config: &EngineConfig,
        events: mpsc::UnboundedSender<SyncEvent>,
    ) -> Self {
        Self {
            client,
            run_id,
            request_timeout: config.request_timeout(),
            retry: RetryPolicy::new(
                Duration::from_millis(config.retry_base_delay_ms),
                Duration::from_millis(config.retry_max_delay_ms),
            ),
            refresh_attempts: config.refresh_max_attempts,
            events,
        }
    }

    /// The run this client talks about
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Backoff used for reports and refreshes
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetch the run
    pub async fn get_run(&self) -> Result<Run> {
        bounded(self.request_timeout, self.client.get_run(self.run_id)).await
    }

    /// Created -> Active
    pub async fn start_run(&self) -> Result<Run> {
        bounded(self.request_timeout, self.client.start_run(self.run_id)).await
    }

    /// Active -> Completed
    pub async fn complete_run(&self, distance_km: f64, duration_secs: u64) -> Result<Run> {
        bounded(
            self.request_timeout,
            self.client
                .complete_run(self.run_id, distance_km, duration_secs),
        )
        .await
    }

    /// Issue a played report after `delay`. The outcome arrives as
    /// [`SyncEvent::Reported`].
    pub fn report_played(&self, message_id: MessageId, attempt: u32, delay: Duration) {
        let client = Arc::clone(&self.client);
        let events = self.events.clone();
        let run_id = self.run_id;
        let limit = self.request_timeout;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            debug!(run_id = %run_id, message_id = %message_id, attempt, "reporting played");
            let result = bounded(limit, client.mark_message_played(run_id, message_id))
                .await
                .map(|_| ());
            let _ = events.send(SyncEvent::Reported {
                message_id,
                attempt,
                result,
            });
        });
    }

    /// Fetch the message list, retrying transient failures with backoff.
    /// The outcome arrives as [`SyncEvent::Refreshed`].
    pub fn refresh(&self) {
        let client = Arc::clone(&self.client);
        let events = self.events.clone();
        let run_id = self.run_id;
        let limit = self.request_timeout;
        let retry = self.retry;
        let attempts = self.refresh_attempts;
        tokio::spawn(async move {
            let mut attempt = 1;
            let result = loop {
                match bounded(limit, client.list_messages(run_id)).await {
                    Err(e) if e.is_retryable() && attempt < attempts => {
                        let delay = retry.delay_for(attempt);
                        warn!(
                            run_id = %run_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "refresh failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    other => break other,
                }
            };
            let _ = events.send(SyncEvent::Refreshed(result));
        });
    }
}
