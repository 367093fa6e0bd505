//! # Proximity Policy
//!
//! `within_range = distance <= threshold`. Poor GPS accuracy is reported and
//! logged but never blocks the check.

use std::time::Duration;

use campus_core::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::distance::haversine_meters;

/// Thresholds governing a proximity check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityPolicy {
    /// Maximum allowed distance from the property, in meters.
    pub threshold_meters: f64,
    /// Accuracy radius above which a fix is flagged as degraded.
    pub degraded_accuracy_meters: f64,
    /// Upper bound on a single location request.
    pub request_timeout_secs: u64,
    /// How long an issued check-in may be redeemed for an audit.
    pub check_in_ttl_secs: u64,
}

impl Default for ProximityPolicy {
    fn default() -> Self {
        Self {
            threshold_meters: 100.0,
            degraded_accuracy_meters: 50.0,
            request_timeout_secs: 15,
            check_in_ttl_secs: 600,
        }
    }
}

impl ProximityPolicy {
    /// The per-request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The check-in lifetime as a `Duration`.
    pub fn check_in_ttl(&self) -> Duration {
        Duration::from_secs(self.check_in_ttl_secs)
    }

    /// Compare a measured position against the target.
    pub fn check(&self, target: &GeoPoint, measured: &GeoPoint, accuracy_meters: f64) -> ProximityResult {
        let distance_meters = haversine_meters(target, measured);
        let degraded_accuracy = !accuracy_meters.is_finite() || accuracy_meters > self.degraded_accuracy_meters;
        if degraded_accuracy {
            tracing::warn!(
                accuracy_meters,
                threshold = self.degraded_accuracy_meters,
                distance_meters,
                "degraded GPS accuracy; proceeding with proximity check"
            );
        }
        ProximityResult {
            within_range: distance_meters <= self.threshold_meters,
            distance_meters,
            degraded_accuracy,
        }
    }
}

/// Outcome of a single proximity check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityResult {
    /// Whether the measured point is within the threshold.
    pub within_range: bool,
    /// Great-circle distance from the target, in meters.
    pub distance_meters: f64,
    /// Whether the reported accuracy exceeded the degraded threshold.
    pub degraded_accuracy: bool,
}

/// [`ProximityPolicy::check`] with the default 100 m policy.
pub fn check_proximity(target: &GeoPoint, measured: &GeoPoint, accuracy_meters: f64) -> ProximityResult {
    ProximityPolicy::default().check(target, measured, accuracy_meters)
}
