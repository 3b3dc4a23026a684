//! Convenient imports for Cheerline.
//!
//! ```ignore
//! use cheerline::prelude::*;
//!
//! let cheerline = Cheerline::in_memory();
//! let run = cheerline.authority().create_run(NewRun::new("Tempo", 8.0))?;
//! ```

pub use std::sync::Arc;

// Main entry point
pub use crate::cheerline::{Cheerline, CheerlineBuilder};

// Error handling
pub use cheerline_core::{Error, Result, SensorFault};

// Records
pub use cheerline_core::{AudioRef, Message, MessageId, NewMessage, NewRun, Run, RunId, RunStatus};

// Authority
pub use cheerline_authority::{AuthorityConfig, RunAuthority};

// Engine
pub use cheerline_engine::{
    AudioOutput, EngineConfig, EngineHandle, EnginePhase, EngineSnapshot, EngineSummary,
    PlaybackOutcome, PositionSample, RecordingOutput, ReportFailurePolicy,
};
