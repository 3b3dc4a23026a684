//! Input bounds enforced by the authority

/// Largest target distance a run may declare, in km
pub const MAX_TARGET_DISTANCE_KM: f64 = 100.0;

/// Maximum run title length, in characters
pub const MAX_TITLE_LEN: usize = 100;

/// Maximum sender display name length, in characters
pub const MAX_SENDER_LEN: usize = 50;

/// Maximum text body length, in characters
pub const MAX_TEXT_LEN: usize = 500;

/// Seconds between creation and expiry of a run
pub const RUN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// [`RUN_TTL_SECS`] as a chrono duration
pub fn run_ttl() -> chrono::Duration {
    chrono::Duration::seconds(RUN_TTL_SECS)
}
