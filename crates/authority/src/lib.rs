//! Run lifecycle authority for Cheerline
//!
//! The server side of the system. It exclusively owns run and message
//! records, enforces the `created -> active -> completed` state machine,
//! validates submissions, stores audio blobs, and reclaims runs once their
//! fixed expiry passes.
//!
//! Each request is handled independently as a versioned read-modify-write
//! against a [`DocumentStore`], so concurrent writers to one run (a runner's
//! mark-played racing a supporter's add-message) retry instead of losing
//! updates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authority;
pub mod blob;
pub mod clock;
pub mod config;
pub mod reaper;
pub mod store;

pub use authority::{ReapReport, RunAuthority};
pub use blob::{BlobStore, InMemoryBlobStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthorityConfig;
pub use reaper::{spawn_reaper, ReaperHandle};
pub use store::{DocumentStore, InMemoryDocumentStore, Versioned};
