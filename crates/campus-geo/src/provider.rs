//! # Geolocation Provider
//!
//! The device or browser location API, abstracted as an async trait so the
//! gate can be driven by a real provider, a relay from a mobile client, or
//! [`MockGeolocationProvider`] in tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use campus_core::{GeoPoint, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A single position reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// Measured coordinate.
    pub point: GeoPoint,
    /// Reported 68% confidence radius in meters.
    pub accuracy_meters: f64,
    /// When the device captured the reading.
    pub captured_at: Timestamp,
}

/// Parameters for one location request.
#[derive(Debug, Clone, Copy)]
pub struct PositionRequest {
    /// Readings captured before this instant are cached and must be refused.
    pub not_before: Timestamp,
    /// Upper bound the caller will wait.
    pub timeout: Duration,
    /// Ask the device for its most accurate source.
    pub high_accuracy: bool,
}

/// Errors reported by a geolocation provider or raised while validating a fix.
///
/// All variants are retryable by re-entering `Requesting`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeolocationError {
    /// The user or OS refused location access.
    #[error("location permission denied")]
    PermissionDenied,

    /// No position could be determined.
    #[error("position unavailable: {reason}")]
    PositionUnavailable {
        /// Provider-supplied detail.
        reason: String,
    },

    /// The request did not complete within its bound.
    #[error("location request timed out after {elapsed_ms}ms")]
    Timeout {
        /// How long the request ran.
        elapsed_ms: u64,
    },

    /// The provider itself failed.
    #[error("geolocation API error: {reason}")]
    Api {
        /// Provider-supplied detail.
        reason: String,
    },

    /// The provider returned a cached or previously used reading.
    #[error("stale position captured at {captured_at}, request started at {not_before}")]
    StalePosition {
        /// When the refused reading was captured.
        captured_at: Timestamp,
        /// Start of the request window.
        not_before: Timestamp,
    },
}

impl GeolocationError {
    /// Wire code: `permission_denied`, `position_unavailable`, `timeout` or `api_error`.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::PositionUnavailable { .. } | Self::StalePosition { .. } => "position_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Api { .. } => "api_error",
        }
    }

    /// Map a wire code back to an error. Unknown codes become `Api`.
    pub fn from_code(code: &str, detail: impl Into<String>) -> Self {
        match code {
            "permission_denied" => Self::PermissionDenied,
            "position_unavailable" => Self::PositionUnavailable {
                reason: detail.into(),
            },
            "timeout" => Self::Timeout { elapsed_ms: 0 },
            _ => Self::Api {
                reason: detail.into(),
            },
        }
    }
}

/// Source of position fixes.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Obtain a fresh reading. Implementations must not serve cached fixes
    /// older than `request.not_before`; the gate re-checks regardless.
    async fn current_position(&self, request: &PositionRequest) -> Result<PositionFix, GeolocationError>;

    /// Human-readable provider name for logs.
    fn provider_name(&self) -> &str;
}

/// A queued response for [`MockGeolocationProvider`].
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A fresh reading stamped at call time.
    Fix {
        /// Reported point.
        point: GeoPoint,
        /// Reported accuracy.
        accuracy_meters: f64,
    },
    /// A reading stamped `age` before the request started.
    Stale {
        /// Reported point.
        point: GeoPoint,
        /// Reported accuracy.
        accuracy_meters: f64,
        /// How far before `not_before` the reading was captured.
        age: chrono::Duration,
    },
    /// Replays an exact earlier fix, timestamp included.
    Replay(PositionFix),
    /// An error.
    Error(GeolocationError),
    /// Never resolves; exercises the request timeout.
    Hang,
}

/// Provider that plays back queued responses in order.
#[derive(Debug, Default)]
pub struct MockGeolocationProvider {
    queue: Mutex<VecDeque<MockResponse>>,
}

impl MockGeolocationProvider {
    /// A provider that will return `responses` in order.
    pub fn new(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into_iter().collect()),
        }
    }

    /// Append a response.
    pub fn push(&self, response: MockResponse) {
        self.queue.lock().push_back(response);
    }

    /// Responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl GeolocationProvider for MockGeolocationProvider {
    async fn current_position(&self, request: &PositionRequest) -> Result<PositionFix, GeolocationError> {
        // Pop before awaiting so the lock is never held across a suspension point.
        let next = self.queue.lock().pop_front();
        match next {
            Some(MockResponse::Fix {
                point,
                accuracy_meters,
            }) => Ok(PositionFix {
                point,
                accuracy_meters,
                captured_at: std::cmp::max(Timestamp::now(), request.not_before),
            }),
            Some(MockResponse::Stale {
                point,
                accuracy_meters,
                age,
            }) => Ok(PositionFix {
                point,
                accuracy_meters,
                captured_at: request.not_before.plus(-age),
            }),
            Some(MockResponse::Replay(fix)) => Ok(fix),
            Some(MockResponse::Error(e)) => Err(e),
            Some(MockResponse::Hang) => std::future::pending().await,
            None => Err(GeolocationError::PositionUnavailable {
                reason: "no scripted response".into(),
            }),
        }
    }

    fn provider_name(&self) -> &str {
        "MockGeolocationProvider"
    }
}
