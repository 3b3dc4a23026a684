//! Run and message records
//!
//! This module defines the canonical records owned by the authority:
//!
//! - `RunStatus`: Lifecycle states (Created, Active, Completed)
//! - `Run`: The run document, including its ordered messages
//! - `Message`: One encouragement tied to a distance threshold
//! - `NewMessage` / `NewRun`: Validated submissions
//!
//! ## Lifecycle
//!
//! ```text
//! [create] --> Created --[start]--> Active --[complete]--> Completed
//! ```
//!
//! Transitions only move forward. Distance and duration are zero until
//! completion and are written together, once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::limits;
use crate::types::{AudioRef, MessageId, RunId};

/// Run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, not yet started; supporters may add messages
    Created,
    /// The runner is moving; messages may still be added
    Active,
    /// Finished; read-only
    Completed,
}

impl RunStatus {
    /// Check if run has been created but not started
    pub fn is_created(&self) -> bool {
        matches!(self, RunStatus::Created)
    }

    /// Check if run is in progress
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Active)
    }

    /// Check if run is completed
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    /// Whether `next` is the single legal successor of this status
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Created, RunStatus::Active) | (RunStatus::Active, RunStatus::Completed)
        )
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Created => "created",
            RunStatus::Active => "active",
            RunStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One encouragement message
///
/// Everything except `played` is fixed once the authority appends the
/// message to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier assigned by the authority
    pub id: MessageId,
    /// Distance in km at which the message becomes eligible
    pub threshold_km: f64,
    /// Display name of the supporter
    pub sender: String,
    /// Optional text body (also the speech fallback)
    pub text: Option<String>,
    /// Optional locator of a recorded clip
    pub audio: Option<AudioRef>,
    /// Whether the runner has heard it; only ever goes false -> true
    pub played: bool,
    /// When the message was appended
    pub created_at: DateTime<Utc>,
}

/// Submission for a new message, validated against its run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Trigger threshold in km
    pub threshold_km: f64,
    /// Sender display name
    pub sender: String,
    /// Optional text body
    #[serde(default)]
    pub text: Option<String>,
    /// Optional audio locator from a prior upload
    #[serde(default)]
    pub audio: Option<AudioRef>,
}

impl NewMessage {
    /// Text-only message
    pub fn text(threshold_km: f64, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            threshold_km,
            sender: sender.into(),
            text: Some(text.into()),
            audio: None,
        }
    }

    /// Attach an audio locator
    pub fn with_audio(mut self, audio: AudioRef) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Check the submission against the target distance of its run.
    ///
    /// Sender and text are trimmed; an all-blank text body counts as absent.
    pub fn validate(mut self, target_km: f64) -> Result<NewMessage> {
        if !self.threshold_km.is_finite() || self.threshold_km <= 0.0 {
            return Err(Error::Validation(format!(
                "threshold must be greater than 0, got {}",
                self.threshold_km
            )));
        }
        if self.threshold_km > target_km {
            return Err(Error::Validation(format!(
                "threshold {} exceeds target distance {}",
                self.threshold_km, target_km
            )));
        }

        self.sender = self.sender.trim().to_string();
        if self.sender.is_empty() {
            return Err(Error::Validation("sender is required".into()));
        }
        if self.sender.chars().count() > limits::MAX_SENDER_LEN {
            return Err(Error::Validation(format!(
                "sender exceeds {} characters",
                limits::MAX_SENDER_LEN
            )));
        }

        self.text = self
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if let Some(text) = &self.text {
            if text.chars().count() > limits::MAX_TEXT_LEN {
                return Err(Error::Validation(format!(
                    "text exceeds {} characters",
                    limits::MAX_TEXT_LEN
                )));
            }
        }

        if self.audio.as_ref().is_some_and(|a| a.as_str().is_empty()) {
            return Err(Error::Validation("audio reference is empty".into()));
        }
        if self.text.is_none() && self.audio.is_none() {
            return Err(Error::Validation(
                "message needs a text body or an audio reference".into(),
            ));
        }

        Ok(self)
    }
}

/// Submission for a new run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRun {
    /// Human-readable title
    pub title: String,
    /// Target distance in km
    pub target_km: f64,
}

impl NewRun {
    /// Create a submission
    pub fn new(title: impl Into<String>, target_km: f64) -> Self {
        Self {
            title: title.into(),
            target_km,
        }
    }

    /// Check title and target distance; `max_target_km` comes from config.
    pub fn validate(mut self, max_target_km: f64) -> Result<NewRun> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(Error::Validation("title is required".into()));
        }
        if self.title.chars().count() > limits::MAX_TITLE_LEN {
            return Err(Error::Validation(format!(
                "title exceeds {} characters",
                limits::MAX_TITLE_LEN
            )));
        }
        if !self.target_km.is_finite() || self.target_km <= 0.0 {
            return Err(Error::Validation(format!(
                "target distance must be positive, got {}",
                self.target_km
            )));
        }
        if self.target_km > max_target_km {
            return Err(Error::Validation(format!(
                "target distance {} exceeds maximum {}",
                self.target_km, max_target_km
            )));
        }
        Ok(self)
    }
}

/// The run document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Public identifier
    pub id: RunId,
    /// Title
    pub title: String,
    /// Target distance in km
    pub target_km: f64,
    /// Lifecycle status
    pub status: RunStatus,
    /// Distance covered, written at completion
    pub distance_km: f64,
    /// Elapsed seconds, written at completion
    pub duration_secs: u64,
    /// Set at completion only
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Fixed at creation; the run is reaped after this instant
    pub expires_at: DateTime<Utc>,
    /// Messages in append order
    pub messages: Vec<Message>,
}

impl Run {
    /// Create a run in `Created` state
    pub fn new(new: NewRun, created_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Run {
            id: RunId::new(),
            title: new.title,
            target_km: new.target_km,
            status: RunStatus::Created,
            distance_km: 0.0,
            duration_secs: 0,
            completed_at: None,
            created_at,
            expires_at: created_at + ttl,
            messages: Vec::new(),
        }
    }

    /// Whether the expiry instant has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Created -> Active
    pub fn start(&mut self) -> Result<()> {
        self.transition(RunStatus::Active)
    }

    /// Active -> Completed, recording distance and duration together
    pub fn complete(
        &mut self,
        distance_km: f64,
        duration_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(Error::Validation(format!(
                "completion distance must be a non-negative number, got {}",
                distance_km
            )));
        }
        self.transition(RunStatus::Completed)?;
        self.distance_km = distance_km;
        self.duration_secs = duration_secs;
        self.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::Validation(format!(
                "run {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Append a validated message; rejected once the run is completed
    pub fn add_message(&mut self, new: NewMessage, now: DateTime<Utc>) -> Result<&Message> {
        if self.status.is_completed() {
            return Err(Error::Validation(format!(
                "run {} is completed and accepts no new messages",
                self.id
            )));
        }
        let new = new.validate(self.target_km)?;
        self.messages.push(Message {
            id: MessageId::new(),
            threshold_km: new.threshold_km,
            sender: new.sender,
            text: new.text,
            audio: new.audio,
            played: false,
            created_at: now,
        });
        let last = self.messages.len() - 1;
        Ok(&self.messages[last])
    }

    /// Set the played flag. Returns `true` if the flag changed.
    pub fn mark_played(&mut self, message_id: MessageId) -> Result<bool> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| {
                Error::NotFound(format!("message {} in run {}", message_id, self.id))
            })?;
        let changed = !message.played;
        message.played = true;
        Ok(changed)
    }

    /// Messages ordered by threshold ascending, ties in append order
    pub fn messages_by_threshold(&self) -> Vec<Message> {
        let mut sorted = self.messages.clone();
        // sort_by is stable, so equal thresholds keep append order
        sorted.sort_by(|a, b| a.threshold_km.total_cmp(&b.threshold_km));
        sorted
    }

    /// Audio locators referenced by this run's messages
    pub fn audio_refs(&self) -> impl Iterator<Item = &AudioRef> {
        self.messages.iter().filter_map(|m| m.audio.as_ref())
    }
}
