//! JSON-backed lane map.
//!
//! The oracle crate only defines the geometry interface; this is the
//! concrete map the binary loads.  Lanes are polyline centerlines with a
//! width, a speed limit and an intersection flag, which is enough for the
//! standard oracle bank.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use confdrift_oracle::{Footprint, GeometryService, LaneId, Point2};

/// A lane the map file doesn't know never flags a speed violation.
const UNKNOWN_LANE_LIMIT_KMH: f64 = f64::INFINITY;

#[derive(Debug, Error)]
pub enum LaneMapError {
    #[error("lane map io: {0}")]
    Io(#[from] std::io::Error),
    #[error("lane map parse: {0}")]
    Json(#[from] serde_json::Error),
    #[error("lane `{id}` has fewer than two centerline points")]
    ShortCenterline { id: String },
}

/// One lane as written in the map file.
#[derive(Debug, Deserialize)]
struct LaneRecord {
    id: String,
    speed_limit_kmh: f64,
    width_m: f64,
    #[serde(default)]
    intersection: bool,
    centerline: Vec<[f64; 2]>,
}

#[derive(Debug, Clone)]
struct Lane {
    id: LaneId,
    speed_limit_kmh: f64,
    half_width: f64,
    intersection: bool,
    centerline: Vec<Point2>,
}

/// [`GeometryService`] over a flat list of polyline lanes.
#[derive(Debug, Clone, Default)]
pub struct LaneMap {
    lanes: Vec<Lane>,
}

impl LaneMap {
    pub fn from_file(path: &Path) -> Result<Self, LaneMapError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, LaneMapError> {
        let records: Vec<LaneRecord> = serde_json::from_str(text)?;
        let mut lanes = Vec::with_capacity(records.len());
        for record in records {
            if record.centerline.len() < 2 {
                return Err(LaneMapError::ShortCenterline { id: record.id });
            }
            lanes.push(Lane {
                id: LaneId(record.id),
                speed_limit_kmh: record.speed_limit_kmh,
                half_width: record.width_m / 2.0,
                intersection: record.intersection,
                centerline: record
                    .centerline
                    .iter()
                    .map(|p| Point2::new(p[0], p[1]))
                    .collect(),
            });
        }
        Ok(Self { lanes })
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    fn lane(&self, id: &LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|lane| &lane.id == id)
    }

    /// Perpendicular distance from `point` to the lane's centerline.
    fn centerline_distance(lane: &Lane, point: Point2) -> f64 {
        lane.centerline
            .windows(2)
            .map(|seg| segment_distance(seg[0], seg[1], point))
            .fold(f64::INFINITY, f64::min)
    }
}

fn segment_distance(a: Point2, b: Point2, p: Point2) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return a.distance(&p);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    let projected = Point2::new(a.x + t * dx, a.y + t * dy);
    projected.distance(&p)
}

impl GeometryService for LaneMap {
    fn lane_containing(&self, point: Point2) -> Option<LaneId> {
        self.lanes
            .iter()
            .map(|lane| (lane, Self::centerline_distance(lane, point)))
            .filter(|(lane, distance)| *distance <= lane.half_width)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(lane, _)| lane.id.clone())
    }

    fn speed_limit(&self, lane: &LaneId) -> f64 {
        self.lane(lane)
            .map(|lane| lane.speed_limit_kmh)
            .unwrap_or(UNKNOWN_LANE_LIMIT_KMH)
    }

    /// Lateral clearance only: the footprint's half-width against the lane
    /// width, heading ignored since the vehicle is assumed lane-aligned.
    fn boundary_distance(&self, footprint: &Footprint, lane: &LaneId) -> f64 {
        let Some(lane) = self.lane(lane) else {
            return f64::INFINITY;
        };
        let offset = Self::centerline_distance(lane, footprint.center);
        lane.half_width - offset - footprint.half_width
    }

    fn intersection_ids(&self) -> BTreeSet<LaneId> {
        self.lanes
            .iter()
            .filter(|lane| lane.intersection)
            .map(|lane| lane.id.clone())
            .collect()
    }
}
