//! Unified error types for Cheerline.
//!
//! Every crate in the workspace reports failures through [`Error`]. The
//! variants follow the delivery taxonomy: validation and not-found errors are
//! surfaced and never retried, transient network errors are retried where
//! the caller has a retry policy, and sensor and playback errors are
//! absorbed by the engine without stopping the control loop.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the position sensor stopped producing samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorFault {
    /// The user revoked (or never granted) location permission
    PermissionDenied,
    /// The receiver lost its fix
    SignalLost,
}

impl SensorFault {
    /// Whether clearing this fault requires user action outside the engine
    pub fn needs_user_action(&self) -> bool {
        matches!(self, SensorFault::PermissionDenied)
    }
}

impl std::fmt::Display for SensorFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorFault::PermissionDenied => f.write_str("location permission denied"),
            SensorFault::SignalLost => f.write_str("location signal lost"),
        }
    }
}

/// All Cheerline errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// Malformed or out-of-range input, or an illegal state transition
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown (or expired) run, message, or blob
    #[error("not found: {0}")]
    NotFound(String),

    /// Version mismatch on a conditional write
    #[error("conflict: {0}")]
    Conflict(String),

    /// Timeout or connection failure talking to the authority
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Position sensor unavailable
    #[error("sensor error: {0}")]
    Sensor(SensorFault),

    /// Audio asset could not be fetched, decoded, or played
    #[error("playback error: {0}")]
    Playback(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for Cheerline operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Conflicts succeed on retry with fresh data; transient network errors
    /// may succeed once connectivity returns.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::TransientNetwork(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(
            self,
            Error::Internal(_) | Error::Sensor(SensorFault::PermissionDenied)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Validation(format!("malformed payload: {}", e))
    }
}
