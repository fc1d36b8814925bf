//! Module-delay oracle: message gaps per pipeline stage.
//!
//! Each stage's clock starts at that stage's first message; a stage that
//! never starts never reports.  Gaps are measured against the latest event
//! seen on any subscribed channel, so a silent stage is noticed as soon as
//! any other stage keeps publishing past the threshold.

use crate::engine::Oracle;
use crate::state::ObservationState;
use crate::telemetry::{TelemetryEvent, CHAN_PERCEPTION, CHAN_PLANNING, CHAN_POSE};
use crate::violation::{Violation, ViolationKind};

/// A gap longer than this flags the stage as delayed.
pub const STAGE_GAP_LIMIT_S: f64 = 0.5;

const CHANNELS: [&str; 3] = [CHAN_POSE, CHAN_PERCEPTION, CHAN_PLANNING];

/// Pipeline stages tracked for delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Localization,
    Perception,
    Planning,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Localization, Stage::Perception, Stage::Planning];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Localization => "Localization",
            Stage::Perception => "Perception",
            Stage::Planning => "Planning",
        }
    }

    fn from_channel(channel: &str) -> Option<Stage> {
        match channel {
            CHAN_POSE => Some(Stage::Localization),
            CHAN_PERCEPTION => Some(Stage::Perception),
            CHAN_PLANNING => Some(Stage::Planning),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct StageClock {
    last_seen_ns: Option<i64>,
    gap_open: bool,
}

#[derive(Debug, Default)]
pub struct ModuleDelayOracle {
    clocks: [StageClock; 3],
    last_event_ns: Option<i64>,
    violations: Vec<Violation>,
}

impl ModuleDelayOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_gap(&mut self, stage: Stage, gap_s: f64) {
        self.violations.push(
            Violation::new(ViolationKind::ModuleDelay, stage.label())
                .with_feature("gap_s", gap_s),
        );
    }
}

impl Oracle for ModuleDelayOracle {
    fn name(&self) -> &'static str {
        "ModuleDelayOracle"
    }

    fn interested_channels(&self) -> &[&'static str] {
        &CHANNELS
    }

    fn on_event(&mut self, event: &TelemetryEvent, _shared: &ObservationState) {
        let now = event.timestamp_ns;

        // Every event advances time; check all started stages against it.
        for clock in &mut self.clocks {
            if let Some(last) = clock.last_seen_ns {
                let gap_s = (now - last) as f64 / 1e9;
                if gap_s > STAGE_GAP_LIMIT_S {
                    clock.gap_open = true;
                }
            }
        }

        if let Some(stage) = Stage::from_channel(&event.channel) {
            let index = stage as usize;
            let clock = self.clocks[index];
            if clock.gap_open {
                if let Some(last) = clock.last_seen_ns {
                    let gap_s = (now - last) as f64 / 1e9;
                    self.record_gap(stage, gap_s);
                }
            }
            self.clocks[index] = StageClock {
                last_seen_ns: Some(now),
                gap_open: false,
            };
        }
        self.last_event_ns = Some(now);
    }

    fn finish(&mut self, _shared: &ObservationState) -> Vec<Violation> {
        if let Some(end) = self.last_event_ns {
            for (index, stage) in Stage::ALL.iter().enumerate() {
                let clock = self.clocks[index];
                if clock.gap_open {
                    if let Some(last) = clock.last_seen_ns {
                        let gap_s = (end - last) as f64 / 1e9;
                        self.record_gap(*stage, gap_s);
                    }
                }
            }
        }
        std::mem::take(&mut self.violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2;
    use crate::telemetry::{Message, Pose};

    fn at(channel: &'static str, t_s: f64) -> TelemetryEvent {
        let message = match channel {
            CHAN_POSE => Message::Pose(Pose {
                position: Point2::new(0.0, 0.0),
                heading_rad: 0.0,
                speed_mps: 0.0,
            }),
            CHAN_PERCEPTION => Message::Perception,
            _ => Message::Planning(crate::telemetry::PlanningUpdate {
                decision: None,
                points: vec![],
            }),
        };
        TelemetryEvent::new(channel, message, (t_s * 1e9) as i64)
    }

    fn drive(events: Vec<TelemetryEvent>) -> Vec<Violation> {
        let shared = ObservationState::new();
        let mut oracle = ModuleDelayOracle::new();
        for event in &events {
            oracle.on_event(event, &shared);
        }
        oracle.finish(&shared)
    }

    #[test]
    fn silent_perception_is_flagged_once() {
        // Perception starts at t=0, then goes silent while localization
        // keeps publishing for 0.6s.
        let mut events = vec![at(CHAN_PERCEPTION, 0.0)];
        for i in 0..7 {
            events.push(at(CHAN_POSE, i as f64 * 0.1));
        }
        let violations = drive(events);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ModuleDelay);
        assert_eq!(violations[0].distinguishing_key, "Perception");
        assert!((violations[0].feature("gap_s").unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn a_stage_that_never_starts_does_not_count() {
        // Planning never publishes at all; only perception's gap counts.
        let mut events = vec![at(CHAN_PERCEPTION, 0.0)];
        for i in 0..7 {
            events.push(at(CHAN_POSE, i as f64 * 0.1));
        }
        let violations = drive(events);
        assert!(violations.iter().all(|v| v.distinguishing_key == "Perception"));
    }

    #[test]
    fn arrival_closes_the_gap_and_resets_the_clock() {
        // Localization stays healthy throughout; perception gaps once.
        let events = vec![
            at(CHAN_PERCEPTION, 0.0),
            at(CHAN_POSE, 0.0),
            at(CHAN_POSE, 0.3),
            at(CHAN_POSE, 0.6),
            at(CHAN_PERCEPTION, 0.8),
            at(CHAN_POSE, 0.9),
            at(CHAN_PERCEPTION, 1.0),
            at(CHAN_POSE, 1.2),
        ];
        let violations = drive(events);
        // One closed episode (0.8s gap); nothing open at finish.
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].distinguishing_key, "Perception");
        assert!((violations[0].feature("gap_s").unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn gaps_under_the_threshold_stay_silent() {
        let events = vec![
            at(CHAN_PERCEPTION, 0.0),
            at(CHAN_POSE, 0.1),
            at(CHAN_PERCEPTION, 0.4),
            at(CHAN_POSE, 0.5),
            at(CHAN_PERCEPTION, 0.8),
        ];
        assert!(drive(events).is_empty());
    }

    #[test]
    fn two_episodes_on_the_same_stage_are_two_violations() {
        let events = vec![
            at(CHAN_PERCEPTION, 0.0),
            at(CHAN_POSE, 0.0),
            at(CHAN_POSE, 0.3),
            at(CHAN_POSE, 0.6),
            at(CHAN_PERCEPTION, 0.7),
            at(CHAN_POSE, 0.9),
            at(CHAN_POSE, 1.2),
            at(CHAN_POSE, 1.3),
            at(CHAN_PERCEPTION, 1.5),
        ];
        let violations = drive(events);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.distinguishing_key == "Perception"));
        assert!((violations[0].feature("gap_s").unwrap() - 0.7).abs() < 1e-9);
        assert!((violations[1].feature("gap_s").unwrap() - 0.8).abs() < 1e-9);
    }
}
