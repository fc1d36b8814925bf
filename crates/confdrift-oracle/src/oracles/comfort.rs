//! Comfort oracle: fast acceleration and hard braking.
//!
//! IMU acceleration samples and poses arrive on different channels at
//! different rates, so the oracle buffers both and merges them at
//! end-of-stream by nearest timestamp: each acceleration sample is
//! projected onto the heading of the closest pose, giving a signed
//! longitudinal acceleration.  Samples are then classified against the
//! comfort thresholds and maximal runs of the same classification become
//! one violation each, with the run's duration attached.

use crate::engine::Oracle;
use crate::state::ObservationState;
use crate::telemetry::{Acceleration, Message, TelemetryEvent, CHAN_ACCELERATION, CHAN_POSE};
use crate::violation::{Violation, ViolationKind};

/// Fast-acceleration threshold, m/s².
pub const ACCEL_LIMIT_MPS2: f64 = 4.0;
/// Hard-braking threshold, m/s².
pub const DECEL_LIMIT_MPS2: f64 = -4.0;
/// Borderline samples within this fraction of a threshold do not count.
pub const THRESHOLD_TOLERANCE: f64 = 0.025;

const CHANNELS: [&str; 2] = [CHAN_ACCELERATION, CHAN_POSE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    FastAccel,
    HardBrake,
}

impl Band {
    fn key_prefix(self) -> &'static str {
        match self {
            Band::FastAccel => "fast-accel",
            Band::HardBrake => "hard-brake",
        }
    }
}

fn classify(longitudinal: f64) -> Option<Band> {
    if longitudinal > ACCEL_LIMIT_MPS2 * (1.0 + THRESHOLD_TOLERANCE) {
        Some(Band::FastAccel)
    } else if longitudinal < DECEL_LIMIT_MPS2 * (1.0 + THRESHOLD_TOLERANCE) {
        Some(Band::HardBrake)
    } else {
        None
    }
}

/// Streaming state: two buffered channels, merged at finish.
#[derive(Debug, Default)]
pub struct ComfortOracle {
    accels: Vec<(i64, Acceleration)>,
    headings: Vec<(i64, f64)>,
}

impl ComfortOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heading of the pose nearest in time to `timestamp_ns`.
    ///
    /// Pose events arrive in timestamp order, so a binary search plus a
    /// neighbor comparison is enough.
    fn heading_near(&self, timestamp_ns: i64) -> Option<f64> {
        if self.headings.is_empty() {
            return None;
        }
        let index = match self
            .headings
            .binary_search_by_key(&timestamp_ns, |(t, _)| *t)
        {
            Ok(i) => i,
            Err(i) => {
                if i == 0 {
                    0
                } else if i >= self.headings.len() {
                    self.headings.len() - 1
                } else {
                    let before = &self.headings[i - 1];
                    let after = &self.headings[i];
                    if timestamp_ns - before.0 <= after.0 - timestamp_ns {
                        i - 1
                    } else {
                        i
                    }
                }
            }
        };
        Some(self.headings[index].1)
    }

    /// Signed longitudinal acceleration of one sample.
    fn longitudinal(&self, timestamp_ns: i64, accel: &Acceleration) -> f64 {
        match self.heading_near(timestamp_ns) {
            Some(heading) => accel.x * heading.cos() + accel.y * heading.sin(),
            // No pose in the whole stream: assume map-x alignment.
            None => accel.x,
        }
    }
}

impl Oracle for ComfortOracle {
    fn name(&self) -> &'static str {
        "ComfortOracle"
    }

    fn interested_channels(&self) -> &[&'static str] {
        &CHANNELS
    }

    fn on_event(&mut self, event: &TelemetryEvent, _shared: &ObservationState) {
        match &event.message {
            Message::Acceleration(accel) => self.accels.push((event.timestamp_ns, *accel)),
            Message::Pose(pose) => self.headings.push((event.timestamp_ns, pose.heading_rad)),
            _ => {}
        }
    }

    fn finish(&mut self, _shared: &ObservationState) -> Vec<Violation> {
        let samples: Vec<(i64, f64)> = self
            .accels
            .iter()
            .map(|(t, accel)| (*t, self.longitudinal(*t, accel)))
            .collect();

        let mut violations = Vec::new();
        let mut run: Option<(Band, usize, usize)> = None; // band, first index, last index

        let mut close = |band: Band, first: usize, last: usize, violations: &mut Vec<Violation>| {
            // The run lasts until the first differently-classified sample,
            // or until the final sample when it reaches the stream's end.
            let end_ns = samples
                .get(last + 1)
                .map(|(t, _)| *t)
                .unwrap_or(samples[last].0);
            let duration_s = (end_ns - samples[first].0) as f64 / 1e9;
            let peak = samples[first..=last]
                .iter()
                .map(|(_, a)| *a)
                .fold(0.0_f64, |acc, a| if a.abs() > acc.abs() { a } else { acc });
            let bucket = (peak.abs() * 2.0).round() / 2.0;
            violations.push(
                Violation::new(
                    ViolationKind::Comfort,
                    format!("{}:{:.1}", band.key_prefix(), bucket),
                )
                .with_feature("duration_s", duration_s)
                .with_feature("peak_mps2", peak)
                .with_feature("samples", (last - first + 1) as f64),
            );
        };

        for (index, (_, longitudinal)) in samples.iter().enumerate() {
            match (classify(*longitudinal), &mut run) {
                (Some(band), Some((current, _, last))) if band == *current => {
                    *last = index;
                }
                (Some(band), current_run) => {
                    if let Some((b, first, last)) = current_run.take() {
                        close(b, first, last, &mut violations);
                    }
                    *current_run = Some((band, index, index));
                }
                (None, current_run) => {
                    if let Some((b, first, last)) = current_run.take() {
                        close(b, first, last, &mut violations);
                    }
                }
            }
        }
        if let Some((band, first, last)) = run.take() {
            close(band, first, last, &mut violations);
        }
        violations
    }
}
