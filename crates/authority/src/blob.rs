//! Audio blob storage
//!
//! Upload returns an opaque [`AudioRef`]; the locator is attached to a later
//! add-message call and resolved by the engine through fetch.

use std::sync::Arc;

use cheerline_core::{AudioRef, Error, Result};
use dashmap::DashMap;
use uuid::Uuid;

/// Storage backend for audio clips
pub trait BlobStore: Send + Sync {
    /// Store a clip and return its locator
    fn put(&self, bytes: Vec<u8>) -> Result<AudioRef>;

    /// Fetch a clip
    fn get(&self, locator: &AudioRef) -> Result<Arc<Vec<u8>>>;

    /// Delete a clip. Returns `true` if it existed.
    fn delete(&self, locator: &AudioRef) -> bool;

    /// Whether a clip exists
    fn contains(&self, locator: &AudioRef) -> bool;
}

/// In-process blob store
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<AudioRef, Arc<Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored clips
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether no clips are stored
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, bytes: Vec<u8>) -> Result<AudioRef> {
        if bytes.is_empty() {
            return Err(Error::Validation("audio upload is empty".into()));
        }
        let locator = AudioRef::new(format!("audio/{}", Uuid::new_v4()));
        self.blobs.insert(locator.clone(), Arc::new(bytes));
        Ok(locator)
    }

    fn get(&self, locator: &AudioRef) -> Result<Arc<Vec<u8>>> {
        self.blobs
            .get(locator)
            .map(|b| Arc::clone(b.value()))
            .ok_or_else(|| Error::NotFound(format!("audio {}", locator)))
    }

    fn delete(&self, locator: &AudioRef) -> bool {
        self.blobs.remove(locator).is_some()
    }

    fn contains(&self, locator: &AudioRef) -> bool {
        self.blobs.contains_key(locator)
    }
}
