//! Telemetry events and the recording reader interface.
//!
//! A recording is a finite, ordered sequence of `(channel, message,
//! timestamp)` triples.  The reader that produces them is an external
//! collaborator behind [`RecordingReader`]; everything downstream only sees
//! [`TelemetryEvent`] values.

use std::path::Path;

use crate::engine::OracleError;
use crate::geometry::Point2;

// ── Channel names ───────────────────────────────────────────────

/// Vehicle pose and speed from the localization module.
pub const CHAN_POSE: &str = "/stack/localization/pose";
/// IMU linear acceleration samples.
pub const CHAN_ACCELERATION: &str = "/stack/sensors/imu";
/// Planned trajectory plus the behavior decision behind it.
pub const CHAN_PLANNING: &str = "/stack/planning/trajectory";
/// Predicted obstacle trajectories.
pub const CHAN_PREDICTION: &str = "/stack/prediction/obstacles";
/// Perceived obstacle set.
pub const CHAN_PERCEPTION: &str = "/stack/perception/obstacles";
/// Routing responses carrying the active goal.
pub const CHAN_ROUTING: &str = "/stack/routing/response";

/// Vehicle pose: position, heading and reported speed.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub position: Point2,
    /// Heading in radians, map frame.
    pub heading_rad: f64,
    /// Reported speed in m/s.
    pub speed_mps: f64,
}

/// One IMU linear-acceleration sample, map frame, m/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
}

/// One planning update.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningUpdate {
    /// Behavior decision label ("CRUISE", "STOP", ...), when present.
    pub decision: Option<String>,
    /// Trajectory points in the map frame.
    pub points: Vec<Point2>,
}

/// One routing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingUpdate {
    pub has_goal: bool,
}

/// Decoded message payload of one telemetry event.
///
/// Channels the oracles never look inside (perception, prediction) stay
/// payload-free; their arrival alone is the signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Pose(Pose),
    Acceleration(Acceleration),
    Planning(PlanningUpdate),
    Prediction,
    Perception,
    Routing(RoutingUpdate),
}

/// One telemetry event from a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub channel: String,
    pub message: Message,
    pub timestamp_ns: i64,
}

impl TelemetryEvent {
    pub fn new(channel: &str, message: Message, timestamp_ns: i64) -> Self {
        Self {
            channel: channel.to_string(),
            message,
            timestamp_ns,
        }
    }

    /// Event timestamp in seconds.
    pub fn timestamp_s(&self) -> f64 {
        self.timestamp_ns as f64 / 1e9
    }
}

/// Reads one recording into its ordered event sequence.
///
/// Implementations must be restartable: reading the same path twice yields
/// the same finite sequence.
pub trait RecordingReader {
    fn read(&self, recording: &Path) -> Result<Vec<TelemetryEvent>, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_convert_to_seconds() {
        let event = TelemetryEvent::new(CHAN_PERCEPTION, Message::Perception, 1_500_000_000);
        assert!((event.timestamp_s() - 1.5).abs() < 1e-9);
    }
}
