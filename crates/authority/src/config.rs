//! Authority configuration
//!
//! ```ignore
//! use cheerline_authority::AuthorityConfig;
//!
//! let config = AuthorityConfig::default().with_run_ttl_secs(3600);
//! let config = AuthorityConfig::from_toml_str("max_write_retries = 4")?;
//! ```

use cheerline_core::{limits, Error, Result};
use serde::{Deserialize, Serialize};

/// Tunables for [`crate::RunAuthority`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Seconds from creation until a run expires
    pub run_ttl_secs: i64,
    /// Upper bound on a run's target distance
    pub max_target_distance_km: f64,
    /// How many times a read-modify-write is retried after a version conflict
    pub max_write_retries: u32,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        AuthorityConfig {
            run_ttl_secs: limits::RUN_TTL_SECS,
            max_target_distance_km: limits::MAX_TARGET_DISTANCE_KM,
            max_write_retries: 8,
        }
    }
}

impl AuthorityConfig {
    /// Parse from TOML; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AuthorityConfig = toml::from_str(s)
            .map_err(|e| Error::Validation(format!("invalid authority config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Override the run TTL
    pub fn with_run_ttl_secs(mut self, secs: i64) -> Self {
        self.run_ttl_secs = secs;
        self
    }

    /// Override the maximum target distance
    pub fn with_max_target_distance_km(mut self, km: f64) -> Self {
        self.max_target_distance_km = km;
        self
    }

    /// Override the conflict retry budget
    pub fn with_max_write_retries(mut self, retries: u32) -> Self {
        self.max_write_retries = retries;
        self
    }

    /// TTL as a chrono duration
    pub fn run_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.run_ttl_secs)
    }

    /// Reject nonsensical settings
    pub fn validate(&self) -> Result<()> {
        if self.run_ttl_secs <= 0 {
            return Err(Error::Validation("run_ttl_secs must be positive".into()));
        }
        if !self.max_target_distance_km.is_finite() || self.max_target_distance_km <= 0.0 {
            return Err(Error::Validation(
                "max_target_distance_km must be positive".into(),
            ));
        }
        Ok(())
    }
}
