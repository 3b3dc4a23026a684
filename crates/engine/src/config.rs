//! Engine configuration
//!
//! All timings are milliseconds so the struct maps one-to-one onto a TOML
//! table:
//!
//! ```toml
//! accuracy_ceiling_m = 25.0
//! tick_interval_ms = 500
//! report_failure_policy = "replay"
//! ```

use std::time::Duration;

use cheerline_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// What happens to a message whose played report the authority did not accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFailurePolicy {
    /// Make the message triggerable again. The remote eventually agrees, but
    /// the runner may hear the message twice.
    Replay,
    /// Keep it played locally and retry the report in the background. The
    /// runner hears it at most once, but the remote may never learn it.
    #[default]
    RetryWithoutReplay,
}

/// Tunables for the delivery engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples reporting worse horizontal accuracy are discarded
    pub accuracy_ceiling_m: f64,
    /// Movement at or below this is treated as jitter
    pub min_movement_m: f64,
    /// Trigger evaluation period
    pub tick_interval_ms: u64,
    /// Remote message-list refresh period
    pub refresh_interval_ms: u64,
    /// Upper bound on any single authority call
    pub request_timeout_ms: u64,
    /// Played-report failure handling
    pub report_failure_policy: ReportFailurePolicy,
    /// Report attempts before waiting for the next refresh
    pub max_report_attempts: u32,
    /// First backoff delay
    pub retry_base_delay_ms: u64,
    /// Backoff ceiling
    pub retry_max_delay_ms: u64,
    /// Attempts per refresh before giving up until the next period
    pub refresh_max_attempts: u32,
    /// Audio clips kept in memory
    pub audio_cache_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            accuracy_ceiling_m: 20.0,
            min_movement_m: 5.0,
            tick_interval_ms: 1_000,
            refresh_interval_ms: 30_000,
            request_timeout_ms: 10_000,
            report_failure_policy: ReportFailurePolicy::default(),
            max_report_attempts: 5,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            refresh_max_attempts: 3,
            audio_cache_entries: 32,
        }
    }
}

impl EngineConfig {
    /// Parse from TOML; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(s)
            .map_err(|e| Error::Validation(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Override the accuracy ceiling
    pub fn with_accuracy_ceiling_m(mut self, meters: f64) -> Self {
        self.accuracy_ceiling_m = meters;
        self
    }

    /// Override the jitter floor
    pub fn with_min_movement_m(mut self, meters: f64) -> Self {
        self.min_movement_m = meters;
        self
    }

    /// Override the tick period
    pub fn with_tick_interval(mut self, period: Duration) -> Self {
        self.tick_interval_ms = period.as_millis() as u64;
        self
    }

    /// Override the refresh period
    pub fn with_refresh_interval(mut self, period: Duration) -> Self {
        self.refresh_interval_ms = period.as_millis() as u64;
        self
    }

    /// Override the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Override the report failure policy
    pub fn with_report_failure_policy(mut self, policy: ReportFailurePolicy) -> Self {
        self.report_failure_policy = policy;
        self
    }

    /// Override the report attempt budget
    pub fn with_max_report_attempts(mut self, attempts: u32) -> Self {
        self.max_report_attempts = attempts;
        self
    }

    /// Tick period
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Refresh period
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.accuracy_ceiling_m.is_finite() && self.accuracy_ceiling_m > 0.0) {
            return Err(Error::Validation("accuracy_ceiling_m must be positive".into()));
        }
        if !(self.min_movement_m.is_finite() && self.min_movement_m >= 0.0) {
            return Err(Error::Validation("min_movement_m must be non-negative".into()));
        }
        if self.tick_interval_ms == 0 || self.refresh_interval_ms == 0 {
            return Err(Error::Validation("timer periods must be non-zero".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Validation("request_timeout_ms must be non-zero".into()));
        }
        if self.max_report_attempts == 0 || self.refresh_max_attempts == 0 {
            return Err(Error::Validation("attempt budgets must be at least 1".into()));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(Error::Validation(
                "retry_base_delay_ms exceeds retry_max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}
