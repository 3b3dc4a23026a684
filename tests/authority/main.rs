//! Run Authority Integration Tests
//!
//! Exercises the authority the way independent clients do: one runner
//! driving the lifecycle, many supporters writing concurrently, and a
//! reaper reclaiming expired runs.
//!
//! ```bash
//! cargo test --test authority
//! ```

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use cheerline::authority::{AuthorityConfig, ManualClock, RunAuthority};
use cheerline::types::{NewMessage, NewRun, RunId};

pub mod concurrency;
pub mod expiry;
pub mod lifecycle;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Authority on a clock frozen at a fixed morning
pub fn authority() -> (Arc<RunAuthority>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 3, 6, 30, 0).unwrap(),
    ));
    let authority = Arc::new(RunAuthority::in_memory_with_clock(
        AuthorityConfig::default(),
        clock.clone(),
    ));
    (authority, clock)
}

/// A fresh run with the given target
pub fn run(authority: &RunAuthority, target_km: f64) -> RunId {
    authority
        .create_run(NewRun::new("Marathon training", target_km))
        .expect("create run")
        .id
}

pub fn cheer(threshold_km: f64, sender: &str) -> NewMessage {
    NewMessage::text(threshold_km, sender, format!("{} says keep going", sender))
}
