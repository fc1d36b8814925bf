//! Stack-failure oracle: did the stack do its job at all?
//!
//! Everything here is a terminal finding.  When any of these fire, the
//! engine discards the ordinary violations of the same replay; a stack
//! that never localized or never planned produces garbage downstream, and
//! blaming the comfort oracle for it would poison the search signal.

use crate::engine::Oracle;
use crate::geometry::Point2;
use crate::state::ObservationState;
use crate::telemetry::{
    Message, TelemetryEvent, CHAN_PLANNING, CHAN_POSE, CHAN_PREDICTION, CHAN_ROUTING,
};
use crate::violation::{StackFailureKind, Violation, ViolationKind};

/// Displacement below this means the vehicle never left its start pose.
pub const STATIONARY_DISPLACEMENT_M: f64 = 0.5;

const CHANNELS: [&str; 4] = [CHAN_POSE, CHAN_ROUTING, CHAN_PREDICTION, CHAN_PLANNING];

#[derive(Debug, Default)]
pub struct StackFailureOracle {
    routing_seen: bool,
    prediction_seen: bool,
    planning_seen: bool,
    localization_seen: bool,
    first_trajectory: Option<Vec<Point2>>,
    trajectory_count: usize,
    trajectory_varied: bool,
}

impl StackFailureOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn failure(kind: StackFailureKind) -> Violation {
        Violation::new(ViolationKind::StackFailure, kind.to_string())
    }
}

impl Oracle for StackFailureOracle {
    fn name(&self) -> &'static str {
        "StackFailureOracle"
    }

    fn interested_channels(&self) -> &[&'static str] {
        &CHANNELS
    }

    fn on_event(&mut self, event: &TelemetryEvent, _shared: &ObservationState) {
        match &event.message {
            Message::Pose(_) => self.localization_seen = true,
            Message::Routing(_) => self.routing_seen = true,
            Message::Prediction => self.prediction_seen = true,
            Message::Planning(update) => {
                self.planning_seen = true;
                self.trajectory_count += 1;
                match &self.first_trajectory {
                    None => self.first_trajectory = Some(update.points.clone()),
                    Some(first) if *first != update.points => self.trajectory_varied = true,
                    Some(_) => {}
                }
            }
            _ => {}
        }
    }

    fn finish(&mut self, shared: &ObservationState) -> Vec<Violation> {
        let mut found = Vec::new();
        if !self.localization_seen {
            found.push(Self::failure(StackFailureKind::LocalizationNeverReceived));
        }
        if !self.routing_seen {
            found.push(Self::failure(StackFailureKind::RoutingNeverReceived));
        }
        if !self.prediction_seen {
            found.push(Self::failure(StackFailureKind::PredictionNeverReceived));
        }
        if !self.planning_seen {
            found.push(Self::failure(StackFailureKind::PlanningNeverReceived));
        }
        if self.localization_seen && shared.displacement_m() < STATIONARY_DISPLACEMENT_M {
            found.push(
                Self::failure(StackFailureKind::VehicleNeverMoved)
                    .with_feature("displacement_m", shared.displacement_m())
                    .with_feature("distinct_poses", shared.distinct_pose_count() as f64),
            );
        }
        if self.trajectory_count >= 2 && !self.trajectory_varied {
            found.push(
                Self::failure(StackFailureKind::DegenerateTrajectory)
                    .with_feature("republish_count", self.trajectory_count as f64),
            );
        }
        // Anything above explains the thin stream by itself; only an
        // otherwise-unexplained short replay is "insufficient data".
        if found.is_empty() && !shared.has_minimum_data() {
            found.push(
                Self::failure(StackFailureKind::InsufficientData)
                    .with_feature("distinct_poses", shared.distinct_pose_count() as f64)
                    .with_feature("events", shared.events_seen() as f64),
            );
        }
        found
    }
}
