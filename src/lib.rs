//! # Cheerline
//!
//! Distance-triggered encouragement messages for runners.
//!
//! Supporters attach short text or audio messages to a run, each pinned to a
//! distance. While the runner runs, the delivery engine turns noisy position
//! samples into cumulative distance and plays every message once its
//! threshold is crossed, one at a time, in threshold order.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cheerline::prelude::*;
//!
//! let cheerline = Cheerline::in_memory();
//! let run = cheerline.authority().create_run(NewRun::new("Parkrun", 5.0))?;
//! cheerline
//!     .authority()
//!     .add_message(&run.id, NewMessage::text(2.5, "Alex", "Halfway there!"))?;
//!
//! let engine = cheerline.engine(run.id, Arc::new(RecordingOutput::new())).spawn()?;
//! engine.start().await?;
//! engine.push_sample(PositionSample::new(52.37, 4.90, 5.0))?;
//! // ...
//! let summary = engine.stop().await?;
//! ```
//!
//! ## Crates
//!
//! - [`types`]: identifiers, run and message records, errors
//! - [`authority`]: the server-side run lifecycle authority
//! - [`engine`]: the client-side delivery engine

#![warn(missing_docs)]

mod cheerline;

pub mod prelude;

pub use cheerline_authority as authority;
pub use cheerline_core as types;
pub use cheerline_engine as engine;

// Main entry point
pub use crate::cheerline::{Cheerline, CheerlineBuilder};

// Error handling
pub use cheerline_core::{Error, Result, WireError};
