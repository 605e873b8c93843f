use crate::constants::EARTH_RADIUS_KM;

/// Longitude (`x`) / latitude (`y`) in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoPair {
    pub p0: GeoPoint,
    pub p1: GeoPoint,
}

impl GeoPair {
    pub fn new(p0: GeoPoint, p1: GeoPoint) -> Self {
        Self { p0, p1 }
    }

    pub fn distance_km(&self) -> f64 {
        reference_haversine(self.p0, self.p1, EARTH_RADIUS_KM)
    }
}

/// Great-circle distance between two points.
///
/// Generator and parser must produce the same bits for the same inputs, so the
/// operation order here is fixed.
pub fn reference_haversine(p0: GeoPoint, p1: GeoPoint, earth_radius: f64) -> f64 {
    let dlat = (p1.y - p0.y).to_radians();
    let dlon = (p1.x - p0.x).to_radians();
    let lat1 = p0.y.to_radians();
    let lat2 = p1.y.to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    earth_radius * c
}
