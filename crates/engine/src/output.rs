//! In-process audio output that records what it was asked to do
//!
//! Used wherever there is no real speaker: tests, simulations and headless
//! runs. Clip and speech durations are simulated with the tokio timer, so
//! paused-clock tests observe realistic overlap behavior.

use std::sync::Arc;
use std::time::Duration;

use cheerline_core::{Error, Result};
use parking_lot::Mutex;

use crate::client::BoxFuture;
use crate::sequencer::AudioOutput;

/// One call made on the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCall {
    /// A clip of this many bytes finished playing
    Clip(usize),
    /// This text finished being spoken
    Speech(String),
    /// Playback paused
    Pause,
    /// Playback resumed
    Resume,
}

#[derive(Debug, Default)]
struct Faults {
    clips: bool,
    speech: bool,
}

/// Output that records calls and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingOutput {
    calls: Mutex<Vec<OutputCall>>,
    faults: Mutex<Faults>,
    clip_duration: Duration,
    speech_duration: Duration,
}

impl RecordingOutput {
    /// Instant playback, no faults
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated length of every clip
    pub fn with_clip_duration(mut self, duration: Duration) -> Self {
        self.clip_duration = duration;
        self
    }

    /// Simulated length of every utterance
    pub fn with_speech_duration(mut self, duration: Duration) -> Self {
        self.speech_duration = duration;
        self
    }

    /// Make clip playback fail (decode error)
    pub fn fail_clips(&self, fail: bool) {
        self.faults.lock().clips = fail;
    }

    /// Make speech fail
    pub fn fail_speech(&self, fail: bool) {
        self.faults.lock().speech = fail;
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<OutputCall> {
        self.calls.lock().clone()
    }

    /// Texts spoken, in order
    pub fn spoken(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                OutputCall::Speech(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clips played to completion
    pub fn clips_played(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, OutputCall::Clip(_)))
            .count()
    }

    async fn hold(duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

impl AudioOutput for RecordingOutput {
    fn play_clip(&self, clip: Arc<Vec<u8>>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let failing = self.faults.lock().clips;
            if failing {
                return Err(Error::Playback(format!(
                    "cannot decode clip of {} bytes",
                    clip.len()
                )));
            }
            Self::hold(self.clip_duration).await;
            self.calls.lock().push(OutputCall::Clip(clip.len()));
            Ok(())
        })
    }

    fn speak<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let failing = self.faults.lock().speech;
            if failing {
                return Err(Error::Playback("speech synthesis unavailable".into()));
            }
            Self::hold(self.speech_duration).await;
            self.calls.lock().push(OutputCall::Speech(text.to_string()));
            Ok(())
        })
    }

    fn pause(&self) {
        self.calls.lock().push(OutputCall::Pause);
    }

    fn resume(&self) {
        self.calls.lock().push(OutputCall::Resume);
    }
}
