//! Distance accumulation from noisy position samples
//!
//! Two gates run on every sample:
//!
//! - **Accuracy**: a sample reporting horizontal uncertainty above the
//!   ceiling (or an unusable fix) is discarded outright. It does not even
//!   replace the last known position.
//! - **Movement**: the step from the last accepted sample must exceed the
//!   jitter floor. Shorter steps are dropped *without* advancing the anchor,
//!   so jitter cannot creep into the total over many samples.
//!
//! Only the single last accepted sample is kept. The total never decreases.

use cheerline_core::SensorFault;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// One fix from the position sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Degrees, -90..=90
    pub latitude: f64,
    /// Degrees, -180..=180
    pub longitude: f64,
    /// Reported horizontal uncertainty radius in meters
    pub horizontal_accuracy_m: f64,
    /// Meters above the reference ellipsoid, if the receiver provides it
    #[serde(default)]
    pub altitude_m: Option<f64>,
}

impl PositionSample {
    /// Sample without altitude
    pub fn new(latitude: f64, longitude: f64, horizontal_accuracy_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            horizontal_accuracy_m,
            altitude_m: None,
        }
    }

    /// Attach an altitude
    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    /// The point `meters` due north along the same meridian
    pub fn step_north(&self, meters: f64) -> Self {
        let dlat = (meters / EARTH_RADIUS_M).to_degrees();
        Self {
            latitude: self.latitude + dlat,
            ..*self
        }
    }

    fn is_usable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.horizontal_accuracy_m.is_finite()
            && self.horizontal_accuracy_m >= 0.0
            && self.altitude_m.map_or(true, f64::is_finite)
    }

    /// Distance to `other` in meters: haversine on the surface, combined
    /// with the altitude change when both samples carry one.
    pub fn distance_m(&self, other: &PositionSample) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let dphi = phi2 - phi1;
        let dlambda = (other.longitude - self.longitude).to_radians();

        let a = (dphi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        let horizontal = 2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin();

        match (self.altitude_m, other.altitude_m) {
            (Some(h1), Some(h2)) => horizontal.hypot(h2 - h1),
            _ => horizontal,
        }
    }
}

/// How a sample was handled
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleVerdict {
    /// First usable sample; becomes the anchor
    Anchored,
    /// Step accepted and added to the total
    Accepted {
        /// Meters added
        delta_m: f64,
    },
    /// Accuracy worse than the ceiling, or an unusable fix
    RejectedAccuracy,
    /// Step too short to count
    RejectedJitter,
}

/// Counters for how samples have been handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorStats {
    /// Samples that anchored or advanced the total
    pub accepted: u64,
    /// Samples dropped by the accuracy gate
    pub rejected_accuracy: u64,
    /// Samples dropped by the movement gate
    pub rejected_jitter: u64,
}

/// Turns a sample stream into a monotonically non-decreasing distance
#[derive(Debug, Clone)]
pub struct DistanceAccumulator {
    accuracy_ceiling_m: f64,
    min_movement_m: f64,
    last_accepted: Option<PositionSample>,
    total_m: f64,
    stats: AccumulatorStats,
    fault: Option<SensorFault>,
}

impl DistanceAccumulator {
    /// Create with explicit gate settings
    pub fn new(accuracy_ceiling_m: f64, min_movement_m: f64) -> Self {
        Self {
            accuracy_ceiling_m,
            min_movement_m,
            last_accepted: None,
            total_m: 0.0,
            stats: AccumulatorStats::default(),
            fault: None,
        }
    }

    /// Feed one sample and return the cumulative distance in km
    pub fn ingest(&mut self, sample: &PositionSample) -> f64 {
        self.evaluate(sample);
        self.total_km()
    }

    /// Feed one sample and report what happened to it
    pub fn evaluate(&mut self, sample: &PositionSample) -> SampleVerdict {
        if let Some(fault) = self.fault.take() {
            debug!(%fault, "position samples resumed");
        }

        if !sample.is_usable() || sample.horizontal_accuracy_m > self.accuracy_ceiling_m {
            self.stats.rejected_accuracy += 1;
            return SampleVerdict::RejectedAccuracy;
        }

        let Some(anchor) = self.last_accepted else {
            self.last_accepted = Some(*sample);
            self.stats.accepted += 1;
            return SampleVerdict::Anchored;
        };

        let delta_m = anchor.distance_m(sample);
        if !delta_m.is_finite() || delta_m <= self.min_movement_m {
            self.stats.rejected_jitter += 1;
            return SampleVerdict::RejectedJitter;
        }

        self.total_m += delta_m;
        self.last_accepted = Some(*sample);
        self.stats.accepted += 1;
        SampleVerdict::Accepted { delta_m }
    }

    /// Record that the sensor stopped. The total freezes until samples resume.
    pub fn suspend(&mut self, fault: SensorFault) {
        debug!(%fault, total_km = self.total_km(), "position samples halted");
        self.fault = Some(fault);
    }

    /// Current sensor fault, if samples have stopped
    pub fn fault(&self) -> Option<SensorFault> {
        self.fault
    }

    /// Cumulative distance in km
    pub fn total_km(&self) -> f64 {
        self.total_m / 1000.0
    }

    /// Cumulative distance in meters
    pub fn total_m(&self) -> f64 {
        self.total_m
    }

    /// The anchor for the next movement check
    pub fn last_accepted(&self) -> Option<&PositionSample> {
        self.last_accepted.as_ref()
    }

    /// Sample counters
    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }
}
