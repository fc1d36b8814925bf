//! The oracle engine: channel dispatch, shared state, pre-emption.
//!
//! Oracles are small state machines behind the [`Oracle`] capability
//! interface.  The engine owns the channel→oracle dispatch table, feeds
//! events in timestamp order, maintains the shared [`ObservationState`],
//! and applies the two cross-cutting rules at end-of-stream:
//!
//! 1. stack-failure findings pre-empt everything else from the same
//!    recording, and
//! 2. ordinary findings are suppressed when the stream never reached the
//!    minimum meaningful-data bar (≥3 distinct poses and a routing goal).
//!
//! A fresh engine (and thus a fresh oracle bank) is built per recording;
//! [`OracleEngine::analyze`] consumes the engine to make reuse impossible.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;

use crate::geometry::GeometryService;
use crate::oracles::{
    ComfortOracle, LaneBoundaryOracle, ModuleDelayOracle, SpeedingOracle, StackFailureOracle,
};
use crate::state::ObservationState;
use crate::telemetry::TelemetryEvent;
use crate::violation::Violation;

/// Errors from reading or analyzing a recording.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("failed to read recording {path}: {reason}")]
    RecordingRead { path: String, reason: String },
}

/// A streaming violation detector.
///
/// Implementations keep their own per-recording state; the engine feeds
/// them only events from channels they declared interest in, in timestamp
/// order, then queries them exactly once at end-of-stream.
pub trait Oracle {
    /// Display name for logs.
    fn name(&self) -> &'static str;

    /// Channels this oracle wants events from.
    fn interested_channels(&self) -> &[&'static str];

    /// Feed one event.  `shared` is the engine-maintained cross-cutting
    /// state, already updated with this event.
    fn on_event(&mut self, event: &TelemetryEvent, shared: &ObservationState);

    /// Drain violations at end-of-stream.
    fn finish(&mut self, shared: &ObservationState) -> Vec<Violation>;
}

/// Everything the campaign needs from one analyzed recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingAnalysis {
    /// Violations after pre-emption and minimum-data suppression.
    pub violations: Vec<Violation>,
    /// Whether a stack-level failure pre-empted the other findings.
    pub stack_failed: bool,
    /// Behavior-branch count observed in the stream.
    pub branch_count: usize,
    /// Trajectory sinuosity (≥ 1.0).
    pub sinuosity: f64,
    /// Distinct poses observed.
    pub distinct_poses: usize,
}

/// Dispatches one recording's events through a bank of oracles.
pub struct OracleEngine {
    oracles: Vec<Box<dyn Oracle>>,
    dispatch: BTreeMap<&'static str, Vec<usize>>,
    shared: ObservationState,
}

impl OracleEngine {
    /// Build an engine over an explicit oracle bank.
    pub fn new(oracles: Vec<Box<dyn Oracle>>) -> Self {
        let mut dispatch: BTreeMap<&'static str, Vec<usize>> = BTreeMap::new();
        for (index, oracle) in oracles.iter().enumerate() {
            for &channel in oracle.interested_channels() {
                dispatch.entry(channel).or_default().push(index);
            }
        }
        Self {
            oracles,
            dispatch,
            shared: ObservationState::new(),
        }
    }

    /// The standard five-oracle bank.
    pub fn standard(geometry: Arc<dyn GeometryService>) -> Self {
        Self::new(vec![
            Box::new(ComfortOracle::new()),
            Box::new(SpeedingOracle::new(Arc::clone(&geometry))),
            Box::new(LaneBoundaryOracle::new(geometry)),
            Box::new(ModuleDelayOracle::new()),
            Box::new(StackFailureOracle::new()),
        ])
    }

    /// Number of oracles in the bank.
    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Run the whole stream through the bank and collect the verdict.
    ///
    /// Consumes the engine: oracle state is single-use by design.
    pub fn analyze(mut self, mut events: Vec<TelemetryEvent>) -> RecordingAnalysis {
        events.sort_by_key(|e| e.timestamp_ns);
        for event in &events {
            self.shared.observe(event);
            if let Some(subscribers) = self.dispatch.get(event.channel.as_str()) {
                for &index in subscribers {
                    self.oracles[index].on_event(event, &self.shared);
                }
            }
        }

        let mut violations = Vec::new();
        for oracle in &mut self.oracles {
            let found = oracle.finish(&self.shared);
            if !found.is_empty() {
                debug!("{}: {} finding(s)", oracle.name(), found.len());
            }
            violations.extend(found);
        }

        let stack_failed = violations.iter().any(|v| v.kind.is_stack_failure());
        if stack_failed {
            let before = violations.len();
            violations.retain(|v| v.kind.is_stack_failure());
            info!(
                "stack failure pre-empts {} ordinary finding(s)",
                before - violations.len()
            );
        } else if !self.shared.has_minimum_data() {
            // Without the stack-failure oracle in the bank there is nobody
            // to report the degenerate stream, but ordinary findings from
            // it still must not leak out.
            if !violations.is_empty() {
                info!(
                    "suppressing {} finding(s): {} distinct pose(s), routing goal: {}",
                    violations.len(),
                    self.shared.distinct_pose_count(),
                    self.shared.has_routing_goal()
                );
            }
            violations.clear();
        }

        RecordingAnalysis {
            violations,
            stack_failed,
            branch_count: self.shared.branch_count(),
            sinuosity: self.shared.sinuosity(),
            distinct_poses: self.shared.distinct_pose_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2;
    use crate::telemetry::{
        Message, Pose, RoutingUpdate, CHAN_PERCEPTION, CHAN_POSE, CHAN_ROUTING,
    };
    use crate::violation::ViolationKind;

    /// Oracle that records which events it was shown and reports a fixed
    /// violation per observed event at finish.
    struct ProbeOracle {
        channels: Vec<&'static str>,
        seen: usize,
        kind: ViolationKind,
    }

    impl ProbeOracle {
        fn new(channels: Vec<&'static str>, kind: ViolationKind) -> Self {
            Self {
                channels,
                seen: 0,
                kind,
            }
        }
    }

    impl Oracle for ProbeOracle {
        fn name(&self) -> &'static str {
            "ProbeOracle"
        }

        fn interested_channels(&self) -> &[&'static str] {
            &self.channels
        }

        fn on_event(&mut self, _event: &TelemetryEvent, _shared: &ObservationState) {
            self.seen += 1;
        }

        fn finish(&mut self, _shared: &ObservationState) -> Vec<Violation> {
            (0..self.seen)
                .map(|i| Violation::new(self.kind, format!("probe:{i}")))
                .collect()
        }
    }

    fn pose(x: f64, t: i64) -> TelemetryEvent {
        TelemetryEvent::new(
            CHAN_POSE,
            Message::Pose(Pose {
                position: Point2::new(x, 0.0),
                heading_rad: 0.0,
                speed_mps: 1.0,
            }),
            t,
        )
    }

    fn goal(t: i64) -> TelemetryEvent {
        TelemetryEvent::new(CHAN_ROUTING, Message::Routing(RoutingUpdate { has_goal: true }), t)
    }

    fn meaningful_stream() -> Vec<TelemetryEvent> {
        vec![pose(0.0, 0), goal(1), pose(1.0, 2), pose(2.0, 3)]
    }

    #[test]
    fn events_reach_only_subscribed_oracles() {
        let engine = OracleEngine::new(vec![
            Box::new(ProbeOracle::new(vec![CHAN_POSE], ViolationKind::Comfort)),
            Box::new(ProbeOracle::new(vec![CHAN_PERCEPTION], ViolationKind::Speeding)),
        ]);
        let analysis = engine.analyze(meaningful_stream());
        // Three pose events, zero perception events.
        assert_eq!(analysis.violations.len(), 3);
        assert!(analysis
            .violations
            .iter()
            .all(|v| v.kind == ViolationKind::Comfort));
    }

    #[test]
    fn events_are_fed_in_timestamp_order() {
        struct OrderCheck {
            channels: Vec<&'static str>,
            last: i64,
            sorted: bool,
        }
        impl Oracle for OrderCheck {
            fn name(&self) -> &'static str {
                "OrderCheck"
            }
            fn interested_channels(&self) -> &[&'static str] {
                &self.channels
            }
            fn on_event(&mut self, event: &TelemetryEvent, _shared: &ObservationState) {
                if event.timestamp_ns < self.last {
                    self.sorted = false;
                }
                self.last = event.timestamp_ns;
            }
            fn finish(&mut self, _shared: &ObservationState) -> Vec<Violation> {
                assert!(self.sorted, "events arrived out of order");
                vec![]
            }
        }

        let engine = OracleEngine::new(vec![Box::new(OrderCheck {
            channels: vec![CHAN_POSE, CHAN_ROUTING],
            last: i64::MIN,
            sorted: true,
        })]);
        let mut events = meaningful_stream();
        events.reverse();
        engine.analyze(events);
    }

    #[test]
    fn stack_failures_preempt_ordinary_findings() {
        let engine = OracleEngine::new(vec![
            Box::new(ProbeOracle::new(vec![CHAN_POSE], ViolationKind::Comfort)),
            Box::new(ProbeOracle::new(vec![CHAN_ROUTING], ViolationKind::StackFailure)),
        ]);
        let analysis = engine.analyze(meaningful_stream());
        assert!(analysis.stack_failed);
        assert!(analysis
            .violations
            .iter()
            .all(|v| v.kind == ViolationKind::StackFailure));
    }

    #[test]
    fn findings_are_suppressed_without_minimum_data() {
        let engine = OracleEngine::new(vec![Box::new(ProbeOracle::new(
            vec![CHAN_POSE],
            ViolationKind::Comfort,
        ))]);
        // Two distinct poses, no routing goal: below the bar.
        let analysis = engine.analyze(vec![pose(0.0, 0), pose(1.0, 1)]);
        assert!(analysis.violations.is_empty());
        assert!(!analysis.stack_failed);
    }
}
