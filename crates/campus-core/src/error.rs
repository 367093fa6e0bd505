//! # Error Types
//!
//! Primitive-level errors. Subsystem crates define their own `thiserror`
//! enums and wrap these where needed.

use thiserror::Error;

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations; use integer minor units or micro-degrees: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Domain primitive validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A monetary amount was negative or otherwise unusable.
    #[error("invalid amount {value}: {reason}")]
    InvalidAmount {
        /// The rejected value in minor units.
        value: i64,
        /// Why it was rejected.
        reason: String,
    },

    /// A commission rate outside 0..=10000 basis points.
    #[error("commission rate {bps} bps is outside 0..=10000")]
    InvalidCommissionRate {
        /// The rejected rate.
        bps: u32,
    },

    /// A latitude/longitude pair outside the valid range.
    #[error("invalid coordinate lat={lat} lng={lng}")]
    InvalidCoordinate {
        /// Latitude as given.
        lat: String,
        /// Longitude as given.
        lng: String,
    },

    /// A string field was empty or too long.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_amount_display() {
        let err = ValidationError::InvalidAmount {
            value: -5,
            reason: "must not be negative".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("-5"));
        assert!(msg.contains("must not be negative"));
    }

    #[test]
    fn invalid_coordinate_keeps_rejected_values() {
        let err = crate::GeoPoint::new(f64::NAN, 181.0).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidCoordinate {
                lat: "NaN".into(),
                lng: "181".into(),
            }
        );
        assert_eq!(err.to_string(), "invalid coordinate lat=NaN lng=181");
    }

    #[test]
    fn commission_rate_display() {
        let msg = ValidationError::InvalidCommissionRate { bps: 12_000 }.to_string();
        assert!(msg.contains("12000"));
    }
}
