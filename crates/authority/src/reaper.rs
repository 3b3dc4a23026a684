//! Background expiry reaper
//!
//! Periodically calls [`RunAuthority::reap_expired`] on a tokio task until
//! the returned handle is shut down or dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::authority::RunAuthority;

/// Handle to a running reaper task
pub struct ReaperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper and wait for the task to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}

/// Spawn a reaper that sweeps every `interval`
///
/// Must be called from within a tokio runtime.
pub fn spawn_reaper(authority: Arc<RunAuthority>, interval: Duration) -> ReaperHandle {
    let (tx, mut rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = ticker.tick() => {
                    authority.reap_expired();
                }
            }
        }
        debug!("reaper stopped");
    });
    ReaperHandle {
        shutdown: Some(tx),
        task,
    }
}
