//! Speeding oracle: reported speed versus lane speed limit.

use std::sync::Arc;

use crate::engine::Oracle;
use crate::geometry::GeometryService;
use crate::state::ObservationState;
use crate::telemetry::{Message, TelemetryEvent, CHAN_POSE};
use crate::violation::{Violation, ViolationKind};

/// m/s → km/h.
pub const MPS_TO_KMH: f64 = 3.6;

const CHANNELS: [&str; 1] = [CHAN_POSE];

/// One maximal run of poses sharing the same (over-limit?, limit) pair.
#[derive(Debug, Clone, PartialEq)]
struct SpeedRun {
    over: bool,
    limit_kmh: f64,
    start_ns: i64,
    last_ns: i64,
    peak_kmh: f64,
}

pub struct SpeedingOracle {
    geometry: Arc<dyn GeometryService>,
    current: Option<SpeedRun>,
    violations: Vec<Violation>,
}

impl SpeedingOracle {
    pub fn new(geometry: Arc<dyn GeometryService>) -> Self {
        Self {
            geometry,
            current: None,
            violations: Vec::new(),
        }
    }

    fn close_run(&mut self, run: SpeedRun) {
        if !run.over {
            return;
        }
        let duration_s = (run.last_ns - run.start_ns) as f64 / 1e9;
        self.violations.push(
            Violation::new(
                ViolationKind::Speeding,
                format!("over@{:.0}", run.limit_kmh),
            )
            .with_feature("duration_s", duration_s)
            .with_feature("limit_kmh", run.limit_kmh)
            .with_feature("peak_kmh", run.peak_kmh)
            .with_feature("over_kmh", run.peak_kmh - run.limit_kmh),
        );
    }
}

impl Oracle for SpeedingOracle {
    fn name(&self) -> &'static str {
        "SpeedingOracle"
    }

    fn interested_channels(&self) -> &[&'static str] {
        &CHANNELS
    }

    fn on_event(&mut self, event: &TelemetryEvent, _shared: &ObservationState) {
        let Message::Pose(pose) = &event.message else {
            return;
        };
        let t = event.timestamp_ns;

        let Some(lane) = self.geometry.lane_containing(pose.position) else {
            // Off the map: whatever run was active ends here.
            if let Some(run) = self.current.take() {
                self.close_run(run);
            }
            return;
        };
        let limit_kmh = self.geometry.speed_limit(&lane);
        let speed_kmh = pose.speed_mps * MPS_TO_KMH;
        let over = speed_kmh > limit_kmh;

        match self.current.take() {
            Some(mut run) if run.over == over && (run.limit_kmh - limit_kmh).abs() < 1e-6 => {
                run.last_ns = t;
                run.peak_kmh = run.peak_kmh.max(speed_kmh);
                self.current = Some(run);
            }
            other => {
                if let Some(run) = other {
                    self.close_run(run);
                }
                self.current = Some(SpeedRun {
                    over,
                    limit_kmh,
                    start_ns: t,
                    last_ns: t,
                    peak_kmh: speed_kmh,
                });
            }
        }
    }

    fn finish(&mut self, _shared: &ObservationState) -> Vec<Violation> {
        if let Some(run) = self.current.take() {
            self.close_run(run);
        }
        std::mem::take(&mut self.violations)
    }
}
