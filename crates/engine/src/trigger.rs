//! Tick-driven message selection
//!
//! On every tick the trigger engine asks the ledger for triggerable messages
//! at the current distance and locks each one before it is handed to
//! playback. A later tick can therefore never select the same message while
//! it is still queued or playing.

use cheerline_core::Message;
use tracing::{debug, info};

use crate::ledger::MessageLedger;

/// Selects due messages on each tick
#[derive(Debug, Default)]
pub struct TriggerEngine {
    ticks: u64,
    selected: u64,
}

impl TriggerEngine {
    /// Create an engine with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one tick. Returns the batch to enqueue, in play order, with
    /// every message already locked in the ledger.
    pub fn tick(&mut self, distance_km: f64, ledger: &mut MessageLedger) -> Vec<Message> {
        self.ticks += 1;
        let mut batch = ledger.upcoming(distance_km);
        batch.retain(|m| ledger.mark_selected(&m.id));

        if batch.is_empty() {
            debug!(tick = self.ticks, distance_km, "nothing due");
            return batch;
        }
        self.selected += batch.len() as u64;
        for message in &batch {
            info!(
                message_id = %message.id,
                threshold_km = message.threshold_km,
                sender = %message.sender,
                distance_km,
                "message triggered"
            );
        }
        batch
    }

    /// Ticks evaluated so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Messages selected so far
    pub fn selected(&self) -> u64 {
        self.selected
    }
}
