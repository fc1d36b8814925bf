//! Unsafe lane-change proximity oracle.
//!
//! Watches how long the vehicle footprint keeps intersecting a lane
//! boundary while moving.  Brief straddles are ordinary lane changes; a
//! continuous run longer than [`INTERSECTION_RUN_LIMIT_S`] means the stack
//! is riding the boundary.
//!
//! The candidate boundary set grows as the vehicle enters lanes and is
//! pruned permanently once a boundary falls more than
//! [`BOUNDARY_PRUNE_DISTANCE_M`] behind, which bounds the per-event
//! geometry-query cost over long scenarios.  Junction lanes never become
//! candidates: straddling inside an intersection is how turns work.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::engine::Oracle;
use crate::geometry::{Footprint, GeometryService, LaneId};
use crate::state::ObservationState;
use crate::telemetry::{Message, TelemetryEvent, CHAN_POSE};
use crate::violation::{Violation, ViolationKind};

/// A continuous boundary-intersection run longer than this is a violation.
pub const INTERSECTION_RUN_LIMIT_S: f64 = 5.0;
/// Boundaries farther than this are dropped from the candidate set.
pub const BOUNDARY_PRUNE_DISTANCE_M: f64 = 10.0;
/// Below this speed the vehicle does not count as moving.
const MOVING_SPEED_MPS: f64 = 0.1;

const CHANNELS: [&str; 1] = [CHAN_POSE];

#[derive(Debug, Clone, PartialEq)]
struct BoundaryRun {
    lane: LaneId,
    start_ns: i64,
    last_ns: i64,
}

pub struct LaneBoundaryOracle {
    geometry: Arc<dyn GeometryService>,
    junctions: BTreeSet<LaneId>,
    candidates: BTreeSet<LaneId>,
    pruned: BTreeSet<LaneId>,
    run: Option<BoundaryRun>,
    violations: Vec<Violation>,
}

impl LaneBoundaryOracle {
    pub fn new(geometry: Arc<dyn GeometryService>) -> Self {
        let junctions = geometry.intersection_ids();
        Self {
            geometry,
            junctions,
            candidates: BTreeSet::new(),
            pruned: BTreeSet::new(),
            run: None,
            violations: Vec::new(),
        }
    }

    fn close_run(&mut self, run: BoundaryRun) {
        let duration_s = (run.last_ns - run.start_ns) as f64 / 1e9;
        if duration_s > INTERSECTION_RUN_LIMIT_S {
            self.violations.push(
                Violation::new(ViolationKind::LaneChange, run.lane.0.clone())
                    .with_feature("duration_s", duration_s),
            );
        }
    }
}

impl Oracle for LaneBoundaryOracle {
    fn name(&self) -> &'static str {
        "LaneBoundaryOracle"
    }

    fn interested_channels(&self) -> &[&'static str] {
        &CHANNELS
    }

    fn on_event(&mut self, event: &TelemetryEvent, _shared: &ObservationState) {
        let Message::Pose(pose) = &event.message else {
            return;
        };
        let t = event.timestamp_ns;

        if let Some(lane) = self.geometry.lane_containing(pose.position) {
            if !self.pruned.contains(&lane) && !self.junctions.contains(&lane) {
                self.candidates.insert(lane);
            }
        }

        let footprint = Footprint::at(pose.position, pose.heading_rad);
        let mut to_prune = Vec::new();
        let mut intersecting: Option<LaneId> = None;
        for lane in &self.candidates {
            let distance = self.geometry.boundary_distance(&footprint, lane);
            if distance > BOUNDARY_PRUNE_DISTANCE_M {
                to_prune.push(lane.clone());
            } else if distance <= 0.0 && intersecting.is_none() {
                intersecting = Some(lane.clone());
            }
        }
        for lane in to_prune {
            self.candidates.remove(&lane);
            self.pruned.insert(lane);
        }

        let moving = pose.speed_mps > MOVING_SPEED_MPS;
        let hit = if moving { intersecting } else { None };
        match (self.run.take(), hit) {
            (Some(mut run), Some(lane)) if run.lane == lane => {
                run.last_ns = t;
                self.run = Some(run);
            }
            (Some(run), Some(lane)) => {
                self.close_run(run);
                self.run = Some(BoundaryRun {
                    lane,
                    start_ns: t,
                    last_ns: t,
                });
            }
            (Some(run), None) => self.close_run(run),
            (None, Some(lane)) => {
                self.run = Some(BoundaryRun {
                    lane,
                    start_ns: t,
                    last_ns: t,
                });
            }
            (None, None) => {}
        }
    }

    fn finish(&mut self, _shared: &ObservationState) -> Vec<Violation> {
        if let Some(run) = self.run.take() {
            self.close_run(run);
        }
        std::mem::take(&mut self.violations)
    }
}
