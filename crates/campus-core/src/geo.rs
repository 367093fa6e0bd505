//! # Coordinates
//!
//! WGS-84 latitude/longitude in degrees. Floats are fine for geometry but not
//! for canonical digests, so [`GeoPoint::to_micro`] gives an integer form.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A WGS-84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, -90..=90.
    pub lat: f64,
    /// Longitude, -180..=180.
    pub lng: f64,
}

impl GeoPoint {
    /// Construct a validated coordinate.
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        let point = Self { lat, lng };
        point.validate()?;
        Ok(point)
    }

    /// Check ranges. Needed after deserialization, which bypasses [`GeoPoint::new`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ok = self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng);
        if ok {
            Ok(())
        } else {
            Err(ValidationError::InvalidCoordinate {
                lat: self.lat.to_string(),
                lng: self.lng.to_string(),
            })
        }
    }

    /// Integer micro-degree form for canonical serialization.
    pub fn to_micro(&self) -> MicroDegrees {
        MicroDegrees {
            lat_e6: (self.lat * 1e6).round() as i64,
            lng_e6: (self.lng * 1e6).round() as i64,
        }
    }
}

/// A coordinate as integer millionths of a degree (~11 cm resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MicroDegrees {
    /// Latitude * 1e6.
    pub lat_e6: i64,
    /// Longitude * 1e6.
    pub lng_e6: i64,
}
