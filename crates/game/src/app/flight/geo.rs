use serde::Serialize;

pub(crate) const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct GeoPoint {
    pub(crate) lat_deg: f64,
    pub(crate) lon_deg: f64,
}

impl GeoPoint {
    pub(crate) const fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }
}

/// Great-circle distance in kilometres.
pub(crate) fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat_deg - a.lat_deg).to_radians();
    let d_lon = (b.lon_deg - a.lon_deg).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat_deg.to_radians().cos() * b.lat_deg.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Straight-line interpolation in lat/lon space; the map icon does not follow
/// the great circle.
pub(crate) fn lerp_point(from: GeoPoint, to: GeoPoint, t: f64) -> GeoPoint {
    let t = t.clamp(0.0, 1.0);
    GeoPoint {
        lat_deg: from.lat_deg * (1.0 - t) + to.lat_deg * t,
        lon_deg: from.lon_deg * (1.0 - t) + to.lon_deg * t,
    }
}

/// Screen heading of the route, `atan2(dlat, dlon)` in degrees.
pub(crate) fn heading_degrees(from: GeoPoint, to: GeoPoint) -> f64 {
    (to.lat_deg - from.lat_deg)
        .atan2(to.lon_deg - from.lon_deg)
        .to_degrees()
}
