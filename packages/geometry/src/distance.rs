//! Great-circle distance.

use crate::Position;

/// Mean Earth radius used for distances, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two `(lng, lat)` positions in degrees.
///
/// Symmetric in its arguments and zero for identical positions.
#[must_use]
pub fn haversine_km(a: Position, b: Position) -> f64 {
    let d_lat = (b.y - a.y).to_radians();
    let d_lng = (b.x - a.x).to_radians();
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();

    let sin_d_lat = (d_lat / 2.0).sin();
    let sin_d_lng = (d_lng / 2.0).sin();
    let h = (lat1.cos() * lat2.cos())
        .mul_add(sin_d_lng * sin_d_lng, sin_d_lat * sin_d_lat)
        .clamp(0.0, 1.0);

    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}
