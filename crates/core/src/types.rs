//! Identifier types shared by the authority and the engine
//!
//! This module defines the opaque identifiers used throughout the system:
//! - [`RunId`]: Public, unguessable identifier for a run
//! - [`MessageId`]: Identifier the authority assigns to each message
//! - [`AudioRef`]: Opaque locator for an uploaded audio blob

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a run
///
/// RunId is the only handle a supporter or runner has on a run, so it is
/// generated from UUID v4 randomness and never derived from run content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId using UUID v4
    ///
    /// # Examples
    ///
    /// ```
    /// use cheerline_core::types::RunId;
    ///
    /// let id1 = RunId::new();
    /// let id2 = RunId::new();
    /// assert_ne!(id1, id2);
    /// ```
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }

    /// Parse a RunId from its hyphenated string form
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(RunId)
            .map_err(|_| Error::Validation(format!("malformed run id: {}", s)))
    }

    /// Get raw bytes representation
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a message when the authority appends it to a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Create a new random MessageId
    pub fn new() -> Self {
        MessageId(Uuid::new_v4())
    }

    /// Parse a MessageId from its hyphenated string form
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(MessageId)
            .map_err(|_| Error::Validation(format!("malformed message id: {}", s)))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque locator for an audio blob
///
/// Returned by audio upload and attached to a later add-message call.
/// The engine never interprets the contents, it only hands the locator
/// back to an asset source for retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(String);

impl AudioRef {
    /// Wrap a locator string
    pub fn new(locator: impl Into<String>) -> Self {
        AudioRef(locator.into())
    }

    /// Borrow the locator string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AudioRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AudioRef {
    fn from(s: &str) -> Self {
        AudioRef::new(s)
    }
}
