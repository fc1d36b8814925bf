//! JSON-lines recording reader.
//!
//! The recorder inside each sandbox drains the stack's output channels
//! into one JSON object per line.  This reader decodes that interchange
//! format into the oracle crate's event model.  Lines on channels the
//! oracles never inspect are dropped here rather than carried through the
//! whole analysis.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use serde::Deserialize;

use confdrift_oracle::telemetry::{
    Acceleration, PlanningUpdate, RoutingUpdate, CHAN_ACCELERATION, CHAN_PERCEPTION,
    CHAN_PLANNING, CHAN_POSE, CHAN_PREDICTION, CHAN_ROUTING,
};
use confdrift_oracle::{Message, OracleError, Point2, Pose, RecordingReader, TelemetryEvent};

#[derive(Debug, Deserialize)]
struct WireEvent {
    channel: String,
    t_ns: i64,
    #[serde(default)]
    pose: Option<WirePose>,
    #[serde(default)]
    accel: Option<WireAccel>,
    #[serde(default)]
    planning: Option<WirePlanning>,
    #[serde(default)]
    routing: Option<WireRouting>,
}

#[derive(Debug, Deserialize)]
struct WirePose {
    x: f64,
    y: f64,
    heading: f64,
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct WireAccel {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct WirePlanning {
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    points: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize)]
struct WireRouting {
    has_goal: bool,
}

impl WireEvent {
    /// Decode into the event model; `None` for channels nobody analyzes.
    fn decode(self) -> Result<Option<TelemetryEvent>, String> {
        let message = match self.channel.as_str() {
            CHAN_POSE => {
                let pose = self.pose.ok_or("pose line without pose payload")?;
                Message::Pose(Pose {
                    position: Point2::new(pose.x, pose.y),
                    heading_rad: pose.heading,
                    speed_mps: pose.speed,
                })
            }
            CHAN_ACCELERATION => {
                let accel = self.accel.ok_or("imu line without accel payload")?;
                Message::Acceleration(Acceleration {
                    x: accel.x,
                    y: accel.y,
                })
            }
            CHAN_PLANNING => {
                let planning = self.planning.ok_or("planning line without payload")?;
                Message::Planning(PlanningUpdate {
                    decision: planning.decision,
                    points: planning
                        .points
                        .into_iter()
                        .map(|(x, y)| Point2::new(x, y))
                        .collect(),
                })
            }
            CHAN_ROUTING => {
                let routing = self.routing.ok_or("routing line without payload")?;
                Message::Routing(RoutingUpdate {
                    has_goal: routing.has_goal,
                })
            }
            CHAN_PREDICTION => Message::Prediction,
            CHAN_PERCEPTION => Message::Perception,
            _ => return Ok(None),
        };
        Ok(Some(TelemetryEvent::new(&self.channel, message, self.t_ns)))
    }
}

/// [`RecordingReader`] over the recorder's JSON-lines output.
#[derive(Debug, Default)]
pub struct JsonlRecordingReader;

impl JsonlRecordingReader {
    pub fn new() -> Self {
        Self
    }
}

impl RecordingReader for JsonlRecordingReader {
    fn read(&self, recording: &Path) -> Result<Vec<TelemetryEvent>, OracleError> {
        let read_error = |reason: String| OracleError::RecordingRead {
            path: recording.display().to_string(),
            reason,
        };

        let file = File::open(recording).map_err(|e| read_error(e.to_string()))?;
        let mut events = Vec::new();
        let mut dropped = 0usize;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| read_error(format!("line {}: {e}", number + 1)))?;
            if line.trim().is_empty() {
                continue;
            }
            let wire: WireEvent = serde_json::from_str(&line)
                .map_err(|e| read_error(format!("line {}: {e}", number + 1)))?;
            match wire.decode() {
                Ok(Some(event)) => events.push(event),
                Ok(None) => dropped += 1,
                Err(reason) => {
                    return Err(read_error(format!("line {}: {reason}", number + 1)))
                }
            }
        }
        if dropped > 0 {
            debug!(
                "{}: dropped {dropped} line(s) on unanalyzed channels",
                recording.display()
            );
        }
        Ok(events)
    }
}
