//! Great-circle distance on a spherical Earth.

use campus_core::GeoPoint;

/// IUGG mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Haversine distance between two points, in meters.
pub fn haversine_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Clamp guards asin against h drifting past 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
pub(crate) fn offset_north(p: &GeoPoint, meters: f64) -> GeoPoint {
    GeoPoint {
        lat: p.lat + (meters / EARTH_RADIUS_METERS).to_degrees(),
        lng: p.lng,
    }
}
