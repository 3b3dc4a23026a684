//! Read-only engine state for display layers
//!
//! The control loop publishes a fresh [`EngineSnapshot`] after every change
//! it makes; consumers never see the ledger or accumulator themselves.

use cheerline_core::{Message, MessageId, RunId, SensorFault};
use serde::{Deserialize, Serialize};

use crate::accumulator::AccumulatorStats;

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// Spawned, waiting for the start intent
    Idle,
    /// Accumulating distance and triggering messages
    Running,
    /// Stop requested; finishing playback and completing the run
    Stopping,
    /// Run completed; the control loop has exited
    Stopped,
}

impl EnginePhase {
    /// Check if the engine is accepting samples and ticks
    pub fn is_running(&self) -> bool {
        matches!(self, EnginePhase::Running)
    }
}

/// A message the runner has not heard yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingMessage {
    /// Message id
    pub id: MessageId,
    /// Sender display name
    pub sender: String,
    /// Trigger distance in km
    pub threshold_km: f64,
    /// Distance still to cover before it triggers, zero if already due
    pub remaining_km: f64,
}

impl UpcomingMessage {
    pub(crate) fn new(message: &Message, distance_km: f64) -> Self {
        Self {
            id: message.id,
            sender: message.sender.clone(),
            threshold_km: message.threshold_km,
            remaining_km: (message.threshold_km - distance_km).max(0.0),
        }
    }
}

/// The message currently coming out of the speaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    /// Message id
    pub id: MessageId,
    /// Sender display name
    pub sender: String,
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// The run being delivered
    pub run_id: RunId,
    /// Lifecycle phase
    pub phase: EnginePhase,
    /// Cumulative distance in km
    pub distance_km: f64,
    /// Trigger evaluations so far
    pub ticks: u64,
    /// Unheard messages in play order
    pub upcoming: Vec<UpcomingMessage>,
    /// What is playing right now
    pub now_playing: Option<NowPlaying>,
    /// Selected messages still waiting for or in playback
    pub queued: usize,
    /// Messages selected for playback so far
    pub played: usize,
    /// Played reports not yet acknowledged by the authority
    pub unconfirmed_reports: usize,
    /// Set while position samples have stopped
    pub sensor_fault: Option<SensorFault>,
    /// Sample counters
    pub samples: AccumulatorStats,
    /// Most recent sync failure, cleared by the next successful refresh
    pub last_sync_error: Option<String>,
}

impl EngineSnapshot {
    /// Initial snapshot before the engine starts
    pub fn idle(run_id: RunId) -> Self {
        Self {
            run_id,
            phase: EnginePhase::Idle,
            distance_km: 0.0,
            ticks: 0,
            upcoming: Vec::new(),
            now_playing: None,
            queued: 0,
            played: 0,
            unconfirmed_reports: 0,
            sensor_fault: None,
            samples: AccumulatorStats::default(),
            last_sync_error: None,
        }
    }
}
