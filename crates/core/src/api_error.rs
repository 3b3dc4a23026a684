//! Wire error representation
//!
//! The authority answers every request with either a success payload or a
//! structured error. This module defines that error shape and its lossless
//! mapping to and from [`Error`].
//!
//! ## Wire Format
//!
//! ```json
//! {
//!   "code": "NotFound",
//!   "message": "run 2f1c...: not found"
//! }
//! ```
//!
//! ## Error Codes (Canonical)
//!
//! | Code | Description |
//! |------|-------------|
//! | ValidationError | Malformed or out-of-range input, illegal transition |
//! | NotFound | Unknown or expired run, message, or blob |
//! | Conflict | Concurrent modification |
//! | TransientNetwork | Timeout or connection failure |
//! | Internal | Bug or invariant violation |
//!
//! Sensor and playback errors never cross the wire; if one is converted
//! it is reported as `Internal`.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Canonical wire error codes
pub mod codes {
    /// Malformed input or illegal transition
    pub const VALIDATION: &str = "ValidationError";
    /// Unknown entity
    pub const NOT_FOUND: &str = "NotFound";
    /// Concurrent modification
    pub const CONFLICT: &str = "Conflict";
    /// Timeout or connection failure
    pub const TRANSIENT_NETWORK: &str = "TransientNetwork";
    /// Everything else
    pub const INTERNAL: &str = "Internal";
}

/// Structured error returned by the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// The canonical error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl WireError {
    /// Create a new wire error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&Error> for WireError {
    fn from(e: &Error) -> Self {
        match e {
            Error::Validation(m) => WireError::new(codes::VALIDATION, m.clone()),
            Error::NotFound(m) => WireError::new(codes::NOT_FOUND, m.clone()),
            Error::Conflict(m) => WireError::new(codes::CONFLICT, m.clone()),
            Error::TransientNetwork(m) => WireError::new(codes::TRANSIENT_NETWORK, m.clone()),
            Error::Internal(m) => WireError::new(codes::INTERNAL, m.clone()),
            other => WireError::new(codes::INTERNAL, other.to_string()),
        }
    }
}

impl From<Error> for WireError {
    fn from(e: Error) -> Self {
        WireError::from(&e)
    }
}

impl From<WireError> for Error {
    fn from(w: WireError) -> Self {
        match w.code.as_str() {
            codes::VALIDATION => Error::Validation(w.message),
            codes::NOT_FOUND => Error::NotFound(w.message),
            codes::CONFLICT => Error::Conflict(w.message),
            codes::TRANSIENT_NETWORK => Error::TransientNetwork(w.message),
            _ => Error::Internal(w.message),
        }
    }
}
