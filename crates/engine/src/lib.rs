//! Client-side delivery engine for Cheerline
//!
//! Turns a stream of position samples into timely playback of supporter
//! messages:
//!
//! - [`accumulator`]: noisy samples to a monotonic distance
//! - [`ledger`]: known messages and their local play state
//! - [`trigger`]: per-tick selection of due messages
//! - [`sequencer`]: serialized, non-overlapping playback
//! - [`sync`]: played reports and message refresh against the authority
//! - [`engine`]: the control loop that owns all of the above
//!
//! Display layers interact only through [`EngineHandle`]: intents in,
//! [`EngineSnapshot`]s out.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accumulator;
pub mod client;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod output;
pub mod scheduler;
pub mod sequencer;
pub mod snapshot;
pub mod sync;
pub mod trigger;

pub use accumulator::{AccumulatorStats, DistanceAccumulator, PositionSample, SampleVerdict};
pub use client::{AuthorityClient, BoxFuture, LocalAuthorityClient};
pub use config::{EngineConfig, ReportFailurePolicy};
pub use engine::{Engine, EngineBuilder, EngineHandle, EngineSummary};
pub use ledger::{LedgerEntry, MergeSummary, MessageLedger, PlayState};
pub use output::{OutputCall, RecordingOutput};
pub use scheduler::{IntervalTicks, ManualTickTrigger, ManualTicks, TickSource};
pub use sequencer::{
    AssetCache, AssetSource, AudioOutput, ClientAssets, PlaybackEvent, PlaybackOutcome,
    PlaybackReport, PlaybackSequencer,
};
pub use snapshot::{EnginePhase, EngineSnapshot, NowPlaying, UpcomingMessage};
pub use sync::{RetryPolicy, SyncClient, SyncEvent};
pub use trigger::TriggerEngine;
