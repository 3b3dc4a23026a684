//! Serialized message playback
//!
//! A single worker task drains a FIFO of messages and plays each one to the
//! end before starting the next, so two messages never overlap.
//!
//! Per message:
//! 1. Audio clip, resolved through the [`AssetCache`] or fetched
//! 2. Speech of the text body if the clip is missing or fails
//! 3. Otherwise skipped, with the reason in the report
//!
//! Audio interruptions arrive on a `watch<bool>`. While set, the current
//! item is paused and no new item starts; nothing is dropped.
//!
//! The worker never touches engine state. It reports through
//! [`PlaybackEvent`]s that the control loop consumes.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use cheerline_core::{AudioRef, Error, Message, MessageId, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{AuthorityClient, BoxFuture};

/// Audio sink
pub trait AudioOutput: Send + Sync {
    /// Play a decoded clip; resolves when playback has finished
    fn play_clip(&self, clip: Arc<Vec<u8>>) -> BoxFuture<'_, Result<()>>;

    /// Synthesize and speak `text`; resolves when speech has finished
    fn speak<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Pause whatever is playing
    fn pause(&self);

    /// Resume after [`AudioOutput::pause`]
    fn resume(&self);
}

/// Where audio clips come from
pub trait AssetSource: Send + Sync {
    /// Fetch the clip behind `locator`
    fn fetch(&self, locator: AudioRef) -> BoxFuture<'_, Result<Arc<Vec<u8>>>>;
}

/// Fetches clips through the authority's binary retrieval operation
pub struct ClientAssets {
    client: Arc<dyn AuthorityClient>,
}

impl ClientAssets {
    /// Wrap a client
    pub fn new(client: Arc<dyn AuthorityClient>) -> Self {
        Self { client }
    }
}

impl AssetSource for ClientAssets {
    fn fetch(&self, locator: AudioRef) -> BoxFuture<'_, Result<Arc<Vec<u8>>>> {
        self.client.fetch_audio(locator)
    }
}

/// Bounded clip cache; the oldest entry is evicted first
#[derive(Debug)]
pub struct AssetCache {
    capacity: usize,
    clips: HashMap<AudioRef, Arc<Vec<u8>>>,
    order: VecDeque<AudioRef>,
}

impl AssetCache {
    /// Cache holding at most `capacity` clips. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clips: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Cached clip
    pub fn get(&self, locator: &AudioRef) -> Option<Arc<Vec<u8>>> {
        self.clips.get(locator).cloned()
    }

    /// Store a clip
    pub fn insert(&mut self, locator: AudioRef, clip: Arc<Vec<u8>>) {
        if self.capacity == 0 || self.clips.contains_key(&locator) {
            return;
        }
        while self.clips.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.clips.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(locator.clone());
        self.clips.insert(locator, clip);
    }

    /// Cached clip count
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// How a message left the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlaybackOutcome {
    /// The recorded clip played
    PlayedAudio,
    /// The text was spoken; `audio_error` says why the clip was not used
    Spoken {
        /// Clip failure, if the message had a clip
        audio_error: Option<String>,
    },
    /// Nothing could be played
    Skipped {
        /// Why
        reason: String,
    },
    /// Dropped from the queue by shutdown before it started
    Discarded,
}

impl PlaybackOutcome {
    /// Whether the runner heard something
    pub fn was_heard(&self) -> bool {
        matches!(self, PlaybackOutcome::PlayedAudio | PlaybackOutcome::Spoken { .. })
    }
}

/// Final record for one queued message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackReport {
    /// The message
    pub message_id: MessageId,
    /// Sender, for display
    pub sender: String,
    /// What happened
    #[serde(flatten)]
    pub outcome: PlaybackOutcome,
}

/// Worker to control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// A message started playing
    Started(MessageId),
    /// A message left the queue
    Finished(PlaybackReport),
}

#[derive(Debug)]
enum Command {
    Enqueue(Vec<Message>),
    Finish,
}

/// Handle to the playback worker
#[derive(Debug)]
pub struct PlaybackSequencer {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl PlaybackSequencer {
    /// Spawn the worker. Events go to `events`; the channel closes when the
    /// worker exits.
    pub fn spawn(
        output: Arc<dyn AudioOutput>,
        assets: Arc<dyn AssetSource>,
        cache_entries: usize,
        fetch_timeout: Duration,
        interruptions: watch::Receiver<bool>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            output,
            assets,
            cache: AssetCache::new(cache_entries),
            fetch_timeout,
            interruptions,
            events,
            commands: rx,
            queue: VecDeque::new(),
            finishing: false,
        };
        let task = tokio::spawn(worker.run());
        Self { commands, task }
    }

    /// Append messages, in order, behind anything already queued
    pub fn enqueue(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        if self.commands.send(Command::Enqueue(messages)).is_err() {
            warn!("playback worker has exited; messages dropped");
        }
    }

    /// Let the current item finish, discard the rest, then exit
    pub fn finish(&self) {
        let _ = self.commands.send(Command::Finish);
    }

    /// Whether the worker has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct Worker {
    output: Arc<dyn AudioOutput>,
    assets: Arc<dyn AssetSource>,
    cache: AssetCache,
    fetch_timeout: Duration,
    interruptions: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    queue: VecDeque<Message>,
    finishing: bool,
}

impl Worker {
    async fn run(mut self) {
        loop {
            while let Ok(command) = self.commands.try_recv() {
                self.apply(command);
            }
            if self.finishing {
                self.discard_queue();
                break;
            }
            if self.queue.is_empty() {
                let command = self.commands.recv().await.unwrap_or(Command::Finish);
                self.apply(command);
                continue;
            }

            if *self.interruptions.borrow() {
                debug!("audio interrupted; holding queue");
                let interruptions = &mut self.interruptions;
                let commands = &mut self.commands;
                tokio::select! {
                    cleared = async {
                        interruptions.wait_for(|interrupted| !*interrupted).await.is_ok()
                    } => {
                        if !cleared {
                            // Interruption source gone for good; stop honoring its last value
                            let (_, detached) = watch::channel(false);
                            self.interruptions = detached;
                        }
                    }
                    command = commands.recv() => {
                        self.apply(command.unwrap_or(Command::Finish));
                    }
                }
                continue;
            }

            let Some(message) = self.queue.pop_front() else {
                continue;
            };
            let _ = self.events.send(PlaybackEvent::Started(message.id));
            let outcome = self.play(&message).await;
            match &outcome {
                PlaybackOutcome::Skipped { reason } => {
                    warn!(message_id = %message.id, %reason, "message skipped")
                }
                outcome => {
                    info!(message_id = %message.id, sender = %message.sender, ?outcome, "message played")
                }
            }
            self.report(&message, outcome);
        }
        debug!("playback worker exiting");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Enqueue(messages) if !self.finishing => self.queue.extend(messages),
            Command::Enqueue(messages) => {
                for message in messages {
                    self.report(&message, PlaybackOutcome::Discarded);
                }
            }
            Command::Finish => self.finishing = true,
        }
    }

    fn discard_queue(&mut self) {
        while let Some(message) = self.queue.pop_front() {
            self.report(&message, PlaybackOutcome::Discarded);
        }
    }

    fn report(&self, message: &Message, outcome: PlaybackOutcome) {
        let _ = self.events.send(PlaybackEvent::Finished(PlaybackReport {
            message_id: message.id,
            sender: message.sender.clone(),
            outcome,
        }));
    }

    async fn play(&mut self, message: &Message) -> PlaybackOutcome {
        let mut audio_error = None;
        if let Some(locator) = &message.audio {
            let played = match self.resolve(locator).await {
                Ok(clip) => {
                    let output = Arc::clone(&self.output);
                    self.perform(output.play_clip(clip)).await
                }
                Err(e) => Err(e),
            };
            match played {
                Ok(()) => return PlaybackOutcome::PlayedAudio,
                Err(e) => {
                    warn!(message_id = %message.id, audio = %locator, error = %e, "audio failed");
                    audio_error = Some(e.to_string());
                }
            }
        }

        let Some(text) = &message.text else {
            return PlaybackOutcome::Skipped {
                reason: audio_error.unwrap_or_else(|| "message has no audio or text".into()),
            };
        };
        let output = Arc::clone(&self.output);
        match self.perform(output.speak(text)).await {
            Ok(()) => PlaybackOutcome::Spoken { audio_error },
            Err(e) => PlaybackOutcome::Skipped {
                reason: match audio_error {
                    Some(audio) => format!("{}; speech: {}", audio, e),
                    None => e.to_string(),
                },
            },
        }
    }

    async fn resolve(&mut self, locator: &AudioRef) -> Result<Arc<Vec<u8>>> {
        if let Some(clip) = self.cache.get(locator) {
            debug!(audio = %locator, "audio cache hit");
            return Ok(clip);
        }
        let clip = tokio::time::timeout(self.fetch_timeout, self.assets.fetch(locator.clone()))
            .await
            .map_err(|_| {
                Error::TransientNetwork(format!(
                    "audio fetch timed out after {}ms",
                    self.fetch_timeout.as_millis()
                ))
            })??;
        if clip.is_empty() {
            return Err(Error::Playback(format!("audio {} is empty", locator)));
        }
        self.cache.insert(locator.clone(), Arc::clone(&clip));
        Ok(clip)
    }

    /// Drive one playback future, pausing and resuming the output as
    /// interruptions come and go
    async fn perform(&mut self, playback: BoxFuture<'_, Result<()>>) -> Result<()> {
        tokio::pin!(playback);
        let mut paused = false;
        loop {
            tokio::select! {
                result = &mut playback => {
                    if paused {
                        self.output.resume();
                    }
                    return result;
                }
                changed = self.interruptions.changed() => {
                    if changed.is_err() {
                        // Interruption source gone: nothing can pause us now
                        if paused {
                            self.output.resume();
                        }
                        return playback.await;
                    }
                    let interrupted = *self.interruptions.borrow_and_update();
                    if interrupted && !paused {
                        debug!("audio interrupted; pausing");
                        self.output.pause();
                        paused = true;
                    } else if !interrupted && paused {
                        debug!("interruption cleared; resuming");
                        self.output.resume();
                        paused = false;
                    }
                }
            }
        }
    }
}
