//! Geographic math for surface positions.
//!
//! Distances on the airport surface are expressed in feet.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const FEET_PER_METER: f64 = 3.280_839_895;

/// A point on the airport surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPos {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn distance_ft(&self, other: &GeoPos) -> f64 {
        distance_ft(*self, *other)
    }
}

/// Closeness thresholds used throughout the surface model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proximity {
    /// Two nodes closer than this are the same physical point.
    pub close_node_ft: f64,
    /// A node within this slack of a link segment lies on the link.
    pub close_node_link_ft: f64,
}

impl Default for Proximity {
    fn default() -> Self {
        Self {
            close_node_ft: 10.0,
            close_node_link_ft: 10.0,
        }
    }
}

/// Great-circle distance in meters using the Haversine formula.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance in feet.
pub fn distance_ft(a: GeoPos, b: GeoPos) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng) * FEET_PER_METER
}

/// Linear interpolation between two points. `ratio` is clamped to [0, 1].
pub fn interpolate(from: GeoPos, to: GeoPos, ratio: f64) -> GeoPos {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        1.0
    };
    GeoPos {
        lat: from.lat + (to.lat - from.lat) * ratio,
        lng: from.lng + (to.lng - from.lng) * ratio,
    }
}

pub fn is_close(a: GeoPos, b: GeoPos, threshold_ft: f64) -> bool {
    distance_ft(a, b) < threshold_ft
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Convert a north/south offset in feet to degrees latitude.
pub fn feet_to_lat(feet: f64, ref_lat_deg: f64) -> f64 {
    feet / FEET_PER_METER / meters_per_deg_lat(ref_lat_deg).max(1e-9)
}

/// Convert an east/west offset in feet to degrees longitude.
pub fn feet_to_lng(feet: f64, ref_lat_deg: f64) -> f64 {
    feet / FEET_PER_METER / meters_per_deg_lon(ref_lat_deg).max(1e-9)
}
