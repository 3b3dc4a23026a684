//! Core types for Cheerline
//!
//! Shared between the run authority (server side) and the delivery engine
//! (client side):
//! - [`RunId`], [`MessageId`], [`AudioRef`]: opaque identifiers
//! - [`Run`], [`Message`], [`RunStatus`]: canonical records and lifecycle
//! - [`Error`]: the error taxonomy, and [`WireError`] for its wire form

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api_error;
pub mod error;
pub mod limits;
pub mod run_types;
pub mod types;

pub use api_error::WireError;
pub use error::{Error, Result, SensorFault};
pub use run_types::{Message, NewMessage, NewRun, Run, RunStatus};
pub use types::{AudioRef, MessageId, RunId};
