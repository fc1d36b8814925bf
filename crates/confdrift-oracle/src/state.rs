//! Cross-cutting observation state shared by all oracles.
//!
//! The engine updates one [`ObservationState`] per recording, before
//! dispatching each event, so every oracle sees the same picture of the
//! stream: the last known pose, whether a routing goal ever appeared, how
//! many distinct poses were observed.  The same state also accumulates the
//! fitness signals that are not violations (behavior branches, trajectory
//! sinuosity).

use crate::geometry::Point2;
use crate::telemetry::{Message, Pose, TelemetryEvent};

/// Minimum distinct poses for a replay to count as a meaningful exercise
/// of the stack.
pub const MIN_DISTINCT_POSES: usize = 3;

/// Positions closer than this are the same pose for counting purposes.
const POSE_EPSILON_M: f64 = 0.01;

/// Below this displacement a sinuosity ratio is meaningless.
const MIN_DISPLACEMENT_M: f64 = 0.5;

/// Stream state maintained by the engine across one recording.
#[derive(Debug, Default)]
pub struct ObservationState {
    last_pose: Option<Pose>,
    last_pose_time_ns: Option<i64>,
    first_position: Option<Point2>,
    last_counted: Option<Point2>,
    distinct_poses: usize,
    path_length_m: f64,
    routing_goal_seen: bool,
    last_decision: Option<String>,
    branch_segments: usize,
    events_seen: usize,
}

impl ObservationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the shared state.
    pub fn observe(&mut self, event: &TelemetryEvent) {
        self.events_seen += 1;
        match &event.message {
            Message::Pose(pose) => self.observe_pose(pose, event.timestamp_ns),
            Message::Routing(update) => {
                if update.has_goal {
                    self.routing_goal_seen = true;
                }
            }
            Message::Planning(update) => {
                if let Some(decision) = &update.decision {
                    if self.last_decision.as_deref() != Some(decision.as_str()) {
                        self.branch_segments += 1;
                        self.last_decision = Some(decision.clone());
                    }
                }
            }
            _ => {}
        }
    }

    fn observe_pose(&mut self, pose: &Pose, timestamp_ns: i64) {
        if self.first_position.is_none() {
            self.first_position = Some(pose.position);
        }
        match &self.last_counted {
            Some(prev) if prev.distance(&pose.position) <= POSE_EPSILON_M => {}
            Some(prev) => {
                // Consecutive-delta odometry; deliberately not resampled,
                // so the estimate depends on the pose channel's rate.
                self.path_length_m += prev.distance(&pose.position);
                self.distinct_poses += 1;
                self.last_counted = Some(pose.position);
            }
            None => {
                self.distinct_poses = 1;
                self.last_counted = Some(pose.position);
            }
        }
        self.last_pose = Some(pose.clone());
        self.last_pose_time_ns = Some(timestamp_ns);
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn last_pose(&self) -> Option<&Pose> {
        self.last_pose.as_ref()
    }

    pub fn last_pose_time_ns(&self) -> Option<i64> {
        self.last_pose_time_ns
    }

    pub fn has_routing_goal(&self) -> bool {
        self.routing_goal_seen
    }

    pub fn distinct_pose_count(&self) -> usize {
        self.distinct_poses
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    /// Whether enough of the stream arrived for ordinary oracles to report.
    pub fn has_minimum_data(&self) -> bool {
        self.distinct_poses >= MIN_DISTINCT_POSES && self.routing_goal_seen
    }

    /// Straight-line distance between the first and last observed position.
    pub fn displacement_m(&self) -> f64 {
        match (&self.first_position, &self.last_counted) {
            (Some(first), Some(last)) => first.distance(last),
            _ => 0.0,
        }
    }

    /// Sum of consecutive pose deltas.
    pub fn path_length_m(&self) -> f64 {
        self.path_length_m
    }

    /// Path length over displacement, at least 1.0.  Reported as 1.0 when
    /// the vehicle barely moved (the never-moved case is a stack failure,
    /// not a sinuosity signal).
    pub fn sinuosity(&self) -> f64 {
        let displacement = self.displacement_m();
        if displacement < MIN_DISPLACEMENT_M {
            return 1.0;
        }
        (self.path_length_m / displacement).max(1.0)
    }

    /// Number of maximal runs of equal planning decisions.
    pub fn branch_count(&self) -> usize {
        self.branch_segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{PlanningUpdate, RoutingUpdate, CHAN_PLANNING, CHAN_POSE, CHAN_ROUTING};

    fn pose_event(x: f64, y: f64, t: i64) -> TelemetryEvent {
        TelemetryEvent::new(
            CHAN_POSE,
            Message::Pose(Pose {
                position: Point2::new(x, y),
                heading_rad: 0.0,
                speed_mps: 1.0,
            }),
            t,
        )
    }

    fn decision_event(label: &str, t: i64) -> TelemetryEvent {
        TelemetryEvent::new(
            CHAN_PLANNING,
            Message::Planning(PlanningUpdate {
                decision: Some(label.to_string()),
                points: vec![],
            }),
            t,
        )
    }

    #[test]
    fn distinct_poses_ignore_jitter_below_epsilon() {
        let mut state = ObservationState::new();
        state.observe(&pose_event(0.0, 0.0, 0));
        state.observe(&pose_event(0.001, 0.0, 1));
        state.observe(&pose_event(5.0, 0.0, 2));
        state.observe(&pose_event(10.0, 0.0, 3));
        assert_eq!(state.distinct_pose_count(), 3);
    }

    #[test]
    fn minimum_data_needs_poses_and_a_goal() {
        let mut state = ObservationState::new();
        for i in 0..3 {
            state.observe(&pose_event(i as f64, 0.0, i));
        }
        assert!(!state.has_minimum_data());

        state.observe(&TelemetryEvent::new(
            CHAN_ROUTING,
            Message::Routing(RoutingUpdate { has_goal: true }),
            10,
        ));
        assert!(state.has_minimum_data());
    }

    #[test]
    fn sinuosity_is_path_over_displacement() {
        let mut state = ObservationState::new();
        // Out 10m, back 10m, then out 1m: path 21, displacement 1.
        state.observe(&pose_event(0.0, 0.0, 0));
        state.observe(&pose_event(10.0, 0.0, 1));
        state.observe(&pose_event(0.0, 0.0, 2));
        state.observe(&pose_event(1.0, 0.0, 3));
        assert!((state.path_length_m() - 21.0).abs() < 1e-9);
        assert!((state.sinuosity() - 21.0).abs() < 1e-9);
    }

    #[test]
    fn sinuosity_degrades_to_one_without_displacement() {
        let mut state = ObservationState::new();
        state.observe(&pose_event(0.0, 0.0, 0));
        state.observe(&pose_event(0.1, 0.0, 1));
        state.observe(&pose_event(0.0, 0.0, 2));
        assert_eq!(state.sinuosity(), 1.0);
    }

    #[test]
    fn branch_count_counts_decision_changes() {
        let mut state = ObservationState::new();
        state.observe(&decision_event("CRUISE", 0));
        state.observe(&decision_event("CRUISE", 1));
        state.observe(&decision_event("STOP", 2));
        state.observe(&decision_event("CRUISE", 3));
        assert_eq!(state.branch_count(), 3);
    }
}
