//! Map/geometry service interface.
//!
//! The map lives outside this crate.  Oracles that need lane information
//! receive a [`GeometryService`] at construction (never through a global
//! accessor) and treat it as read-only.

use std::collections::BTreeSet;
use std::fmt;

/// A point in the map frame, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Identifier of one lane in the map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LaneId(pub String);

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default vehicle half-length, meters.
const VEHICLE_HALF_LENGTH_M: f64 = 2.4;
/// Default vehicle half-width, meters.
const VEHICLE_HALF_WIDTH_M: f64 = 1.05;

/// Oriented rectangular approximation of the vehicle outline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub center: Point2,
    pub heading_rad: f64,
    pub half_length: f64,
    pub half_width: f64,
}

impl Footprint {
    /// Footprint of a standard vehicle at the given pose.
    pub fn at(center: Point2, heading_rad: f64) -> Self {
        Self {
            center,
            heading_rad,
            half_length: VEHICLE_HALF_LENGTH_M,
            half_width: VEHICLE_HALF_WIDTH_M,
        }
    }
}

/// Read-only map queries the oracles rely on.
///
/// `Send + Sync` because the same service instance outlives every
/// per-recording oracle bank in a campaign.
pub trait GeometryService: Send + Sync {
    /// The lane containing a point, if any.
    fn lane_containing(&self, point: Point2) -> Option<LaneId>;

    /// Legal speed limit of a lane, km/h.
    fn speed_limit(&self, lane: &LaneId) -> f64;

    /// Distance from the footprint to the lane's nearest boundary, meters.
    /// Zero or negative means the footprint intersects the boundary.
    fn boundary_distance(&self, footprint: &Footprint, lane: &LaneId) -> f64;

    /// Lanes that belong to intersections/junctions.
    fn intersection_ids(&self) -> BTreeSet<LaneId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance_is_euclidean() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn footprint_uses_standard_vehicle_dimensions() {
        let fp = Footprint::at(Point2::new(1.0, 2.0), 0.5);
        assert!(fp.half_length > fp.half_width);
        assert_eq!(fp.center, Point2::new(1.0, 2.0));
    }
}
