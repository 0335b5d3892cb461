//! The "PROJECTION" Engine - Anchored Local-Frame Geodesy
//!
//! Solves the "Floating Origin" problem by converting WGS84 coordinates into
//! a metric Cartesian frame anchored at one fixed reference point:
//! - Haversine arc lengths per axis for the forward projection
//! - Analytic per-axis inversion for the reverse projection
//! - Haversine bearing/destination for generated camera paths
//!
//! The frame is x east, y north, z up (meters). The planar approximation is
//! intentional: round-tripping is exact to float precision, while metric
//! distortion relative to the true sphere grows with distance from the
//! anchor (negligible at city scale, ~50 km).

use geo::{HaversineBearing, HaversineDestination, HaversineDistance, Point};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (IUGG), matching the haversine sphere used by
/// the `geo` crate.
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A geographic position in WGS84 degrees plus altitude in meters.
///
/// Immutable value type; all engine inputs carry positions in this form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, degrees
    pub lat: f64,

    /// Longitude, degrees
    pub lng: f64,

    /// Altitude above the surface, meters
    pub altitude: f64,
}

impl GeoPoint {
    /// Creates a point at the given latitude/longitude/altitude.
    pub fn new(lat: f64, lng: f64, altitude: f64) -> Self {
        Self { lat, lng, altitude }
    }

    /// Creates a surface point (altitude 0).
    pub fn at_surface(lat: f64, lng: f64) -> Self {
        Self::new(lat, lng, 0.0)
    }

    /// True when all components are finite and lat/lng are in range.
    ///
    /// Entities failing this check are skipped from rendering rather than
    /// projected into degenerate geometry.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.altitude.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }
}

/// Great-circle distance between two points, meters.
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

/// Initial great-circle bearing from `from` toward `to`, degrees in [0, 360).
pub fn initial_bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    from.to_point().haversine_bearing(to.to_point()).rem_euclid(360.0)
}

/// Great-circle destination from `origin` along `bearing_deg` for
/// `distance_m` meters. Altitude is carried over from the origin.
pub fn destination(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let p = origin.to_point().haversine_destination(bearing_deg, distance_m);
    GeoPoint::new(p.y(), p.x(), origin.altitude)
}

/// Geodesic midpoint of two points (half the distance along the initial
/// bearing). Altitude is averaged.
pub fn midpoint(a: GeoPoint, b: GeoPoint) -> GeoPoint {
    let d = haversine_distance_m(a, b);
    let mut mid = destination(a, initial_bearing(a, b), d / 2.0);
    mid.altitude = (a.altitude + b.altitude) / 2.0;
    mid
}

/// Bidirectional converter between geographic coordinates and the local
/// Cartesian frame anchored at a fixed reference point.
///
/// One projector per map session; the anchor never moves.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    /// Origin of the local frame
    anchor: GeoPoint,
}

impl Projector {
    /// Creates a projector anchored at the given reference point.
    pub fn new(anchor: GeoPoint) -> Self {
        Self { anchor }
    }

    /// Returns the anchor reference point.
    #[inline]
    pub fn anchor(&self) -> GeoPoint {
        self.anchor
    }

    /// Projects a geographic point into the local frame.
    ///
    /// Each horizontal axis is the haversine arc length between the anchor
    /// and the point moved along that axis alone, signed by the coordinate
    /// delta; z is the altitude unchanged.
    ///
    /// # Returns
    /// * `Some(v)` - Local position, meters
    /// * `None` - Input (or anchor) is NaN/out-of-range; caller skips the entity
    pub fn to_local(&self, point: GeoPoint) -> Option<Vector3<f64>> {
        if !point.is_valid() || !self.anchor.is_valid() {
            return None;
        }

        let origin = self.anchor.to_point();
        let along_lng = Point::new(point.lng, self.anchor.lat);
        let along_lat = Point::new(self.anchor.lng, point.lat);

        let x = origin.haversine_distance(&along_lng) * (point.lng - self.anchor.lng).signum();
        let y = origin.haversine_distance(&along_lat) * (point.lat - self.anchor.lat).signum();

        Some(Vector3::new(x, y, point.altitude))
    }

    /// Projects a local-frame position back to geographic coordinates.
    ///
    /// Inverts `to_local` axis by axis: the meridian arc for latitude, and
    /// the spherical-triangle relation at the anchor parallel for longitude
    /// (`dlng = 2·asin(sin(x / 2R) / cos(anchor_lat))`). Exact inverse of
    /// the forward projection, so `to_geo(to_local(p))` round-trips to
    /// float precision.
    pub fn to_geo(&self, v: Vector3<f64>) -> GeoPoint {
        let lat = self.anchor.lat + (v.y / MEAN_EARTH_RADIUS_M).to_degrees();

        let cos_lat = self.anchor.lat.to_radians().cos();
        let half_arc = (v.x.abs() / (2.0 * MEAN_EARTH_RADIUS_M)).sin();
        let ratio = if cos_lat > 0.0 {
            (half_arc / cos_lat).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let dlng = (2.0 * ratio.asin()).to_degrees() * v.x.signum();

        GeoPoint::new(lat, self.anchor.lng + dlng, v.z)
    }
}
