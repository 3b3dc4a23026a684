//! Run lifecycle authority
//!
//! The authority owns the canonical run documents. It provides:
//! - Run lifecycle: create, get, start, complete
//! - Message list: add, list (threshold order), mark played
//! - Audio blobs: upload, fetch
//! - Expiry: runs past their expiry instant read as not found and are
//!   removed, with their blobs, by [`RunAuthority::reap_expired`]
//!
//! ## Status Transitions
//!
//! ```text
//! Created --start--> Active --complete--> Completed
//! ```
//!
//! Any other transition fails with `Validation`.
//!
//! ## Concurrent Writers
//!
//! Every mutation is a read-modify-write against a versioned document. The
//! write is conditional on the version read; on `Conflict` the whole cycle
//! is retried with a fresh read, up to `max_write_retries` times. Mutation
//! closures may therefore run more than once and must only touch the `Run`
//! they are given.

use std::sync::Arc;

use cheerline_core::{AudioRef, Error, Message, MessageId, NewMessage, NewRun, Result, Run, RunId};
use tracing::{debug, info, warn};

use crate::blob::{BlobStore, InMemoryBlobStore};
use crate::clock::{Clock, SystemClock};
use crate::config::AuthorityConfig;
use crate::store::{DocumentStore, InMemoryDocumentStore};

/// Result of one mutation attempt
enum Mutation<T> {
    /// Persist the modified run, then return the value
    Write(T),
    /// Nothing changed; return the value without writing
    Skip(T),
}

/// Summary of one reaping pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Runs deleted
    pub runs_removed: usize,
    /// Audio blobs deleted along with them
    pub blobs_removed: usize,
}

/// The server-side owner of runs and messages
pub struct RunAuthority {
    config: AuthorityConfig,
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl RunAuthority {
    /// Create an authority over the given backends
    pub fn new(
        config: AuthorityConfig,
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            blobs,
            clock,
        }
    }

    /// In-memory stores and the wall clock
    pub fn in_memory(config: AuthorityConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(SystemClock),
        )
    }

    /// In-memory stores with an injected clock
    pub fn in_memory_with_clock(config: AuthorityConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryBlobStore::new()),
            clock,
        )
    }

    /// Active configuration
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    // =========================================================================
    // Run lifecycle
    // =========================================================================

    /// Create a run in `Created` state
    pub fn create_run(&self, new: NewRun) -> Result<Run> {
        let new = new.validate(self.config.max_target_distance_km)?;
        let run = Run::new(new, self.clock.now(), self.config.run_ttl());
        self.store.insert(run.clone())?;
        info!(run_id = %run.id, target_km = run.target_km, "run created");
        Ok(run)
    }

    /// Fetch a run; expired runs read as not found
    pub fn get_run(&self, id: &RunId) -> Result<Run> {
        self.load(id).map(|doc| doc.value)
    }

    /// Created -> Active
    pub fn start_run(&self, id: &RunId) -> Result<Run> {
        let run = self.update(id, |run| {
            run.start()?;
            Ok(Mutation::Write(run.clone()))
        })?;
        info!(run_id = %id, "run started");
        Ok(run)
    }

    /// Active -> Completed, recording distance and duration in one write
    pub fn complete_run(&self, id: &RunId, distance_km: f64, duration_secs: u64) -> Result<Run> {
        let now = self.clock.now();
        let run = self.update(id, |run| {
            run.complete(distance_km, duration_secs, now)?;
            Ok(Mutation::Write(run.clone()))
        })?;
        info!(run_id = %id, distance_km, duration_secs, "run completed");
        Ok(run)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Append a message. Fails on a completed run, an out-of-range
    /// threshold, or an audio locator that was never uploaded.
    pub fn add_message(&self, id: &RunId, new: NewMessage) -> Result<Message> {
        if let Some(audio) = &new.audio {
            if !self.blobs.contains(audio) {
                return Err(Error::Validation(format!("unknown audio reference {}", audio)));
            }
        }
        let now = self.clock.now();
        let message = self.update(id, |run| {
            let added = run.add_message(new.clone(), now)?.clone();
            Ok(Mutation::Write(added))
        })?;
        info!(
            run_id = %id,
            message_id = %message.id,
            threshold_km = message.threshold_km,
            "message added"
        );
        Ok(message)
    }

    /// All messages, threshold ascending, ties in append order
    pub fn list_messages(&self, id: &RunId) -> Result<Vec<Message>> {
        Ok(self.get_run(id)?.messages_by_threshold())
    }

    /// Set a message's played flag. Already-played is a no-op success.
    pub fn mark_message_played(&self, id: &RunId, message_id: &MessageId) -> Result<Message> {
        let message_id = *message_id;
        self.update(id, |run| {
            let changed = run.mark_played(message_id)?;
            let message = run
                .messages
                .iter()
                .find(|m| m.id == message_id)
                .cloned()
                .ok_or_else(|| Error::Internal(format!("message {} vanished", message_id)))?;
            if changed {
                debug!(run_id = %run.id, message_id = %message_id, "message marked played");
                Ok(Mutation::Write(message))
            } else {
                Ok(Mutation::Skip(message))
            }
        })
    }

    // =========================================================================
    // Audio
    // =========================================================================

    /// Store an audio clip and return its locator
    pub fn upload_audio(&self, bytes: Vec<u8>) -> Result<AudioRef> {
        let size = bytes.len();
        let locator = self.blobs.put(bytes)?;
        debug!(audio = %locator, size, "audio uploaded");
        Ok(locator)
    }

    /// Fetch an audio clip
    pub fn fetch_audio(&self, locator: &AudioRef) -> Result<Arc<Vec<u8>>> {
        self.blobs.get(locator)
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Delete every expired run and the audio its messages reference
    pub fn reap_expired(&self) -> ReapReport {
        let now = self.clock.now();
        let mut report = ReapReport::default();
        for id in self.store.expired(now) {
            let Some(run) = self.store.delete(&id) else {
                continue;
            };
            report.runs_removed += 1;
            for audio in run.audio_refs() {
                if self.blobs.delete(audio) {
                    report.blobs_removed += 1;
                }
            }
            debug!(run_id = %id, expired_at = %run.expires_at, "run reaped");
        }
        if report.runs_removed > 0 {
            info!(
                runs = report.runs_removed,
                blobs = report.blobs_removed,
                "reaped expired runs"
            );
        }
        report
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn load(&self, id: &RunId) -> Result<crate::store::Versioned<Run>> {
        let doc = self
            .store
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("run {}", id)))?;
        if doc.value.is_expired(self.clock.now()) {
            return Err(Error::NotFound(format!("run {} has expired", id)));
        }
        Ok(doc)
    }

    fn update<T, F>(&self, id: &RunId, mut mutate: F) -> Result<T>
    where
        F: FnMut(&mut Run) -> Result<Mutation<T>>,
    {
        let attempts = self.config.max_write_retries + 1;
        for attempt in 0..attempts {
            let doc = self.load(id)?;
            let mut run = doc.value;
            let value = match mutate(&mut run)? {
                Mutation::Skip(value) => return Ok(value),
                Mutation::Write(value) => value,
            };
            match self.store.replace(run, doc.version) {
                Ok(_) => return Ok(value),
                Err(e) if e.is_conflict() => {
                    debug!(run_id = %id, attempt, "write conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        warn!(run_id = %id, attempts, "giving up after repeated write conflicts");
        Err(Error::Conflict(format!(
            "run {}: too many concurrent writers",
            id
        )))
    }
}
