//! Versioned run document store
//!
//! One document per run, keyed by [`RunId`]. Every stored document carries a
//! version that starts at 1 and increments on each successful write; writes
//! are conditional on the version the writer read.
//!
//! # Design
//!
//! - DashMap: sharded by RunId, lock-free reads
//! - Conditional replace: the version check and the swap happen under the
//!   same shard guard, so two writers that read the same version cannot
//!   both succeed
//! - Different runs never contend

use chrono::{DateTime, Utc};
use cheerline_core::{Error, Result, Run, RunId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A document together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// The document
    pub value: T,
    /// Monotonic per-document version
    pub version: u64,
}

/// Storage backend for run documents
pub trait DocumentStore: Send + Sync {
    /// Insert a new document at version 1. Fails with `Conflict` if the id exists.
    fn insert(&self, run: Run) -> Result<u64>;

    /// Read a document and its version
    fn get(&self, id: &RunId) -> Option<Versioned<Run>>;

    /// Replace a document if it is still at `expected_version`.
    ///
    /// Returns the new version. Fails with `Conflict` on a version mismatch
    /// and `NotFound` if the document was deleted in the meantime.
    fn replace(&self, run: Run, expected_version: u64) -> Result<u64>;

    /// Remove a document, returning it if present
    fn delete(&self, id: &RunId) -> Option<Run>;

    /// Ids of documents whose expiry is at or before `now`
    fn expired(&self, now: DateTime<Utc>) -> Vec<RunId>;

    /// Number of stored documents
    fn len(&self) -> usize;

    /// Whether the store holds no documents
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process document store
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: DashMap<RunId, Versioned<Run>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn insert(&self, run: Run) -> Result<u64> {
        match self.docs.entry(run.id) {
            Entry::Occupied(_) => Err(Error::Conflict(format!("run {} already exists", run.id))),
            Entry::Vacant(slot) => {
                slot.insert(Versioned {
                    value: run,
                    version: 1,
                });
                Ok(1)
            }
        }
    }

    #[inline]
    fn get(&self, id: &RunId) -> Option<Versioned<Run>> {
        self.docs.get(id).map(|doc| doc.value().clone())
    }

    fn replace(&self, run: Run, expected_version: u64) -> Result<u64> {
        let id = run.id;
        let mut doc = self
            .docs
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("run {}", id)))?;
        if doc.version != expected_version {
            return Err(Error::Conflict(format!(
                "run {}: expected version {}, found {}",
                id, expected_version, doc.version
            )));
        }
        doc.version += 1;
        doc.value = run;
        Ok(doc.version)
    }

    #[inline]
    fn delete(&self, id: &RunId) -> Option<Run> {
        self.docs.remove(id).map(|(_, doc)| doc.value)
    }

    fn expired(&self, now: DateTime<Utc>) -> Vec<RunId> {
        self.docs
            .iter()
            .filter(|entry| entry.value().value.is_expired(now))
            .map(|entry| *entry.key())
            .collect()
    }

    fn len(&self) -> usize {
        self.docs.len()
    }
}
