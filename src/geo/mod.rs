use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// A latitude/longitude pair in decimal degrees.
///
/// `(0, 0)` is used by profiles as an "unknown location" sentinel; it is a
/// valid point and yields large but finite distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const UNKNOWN: GeoPoint = GeoPoint { lat: 0.0, lng: 0.0 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Great-circle distance in kilometers (haversine, mean Earth radius).
///
/// Total over finite inputs: no bounds checking is done on the degrees.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    // Rounding can push `haversine` a hair outside [0, 1] for antipodal points.
    let haversine =
        (sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng).clamp(0.0, 1.0);
    let central_angle = 2.0 * haversine.sqrt().atan2((1.0 - haversine).sqrt());

    EARTH_RADIUS_KM * central_angle
}
