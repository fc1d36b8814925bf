//! Violation records produced by the oracles.

use std::collections::BTreeMap;
use std::fmt;

/// Which oracle produced a violation.  One tag per oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViolationKind {
    Comfort,
    Speeding,
    LaneChange,
    ModuleDelay,
    StackFailure,
}

impl ViolationKind {
    /// Stack failures pre-empt every other finding of the same replay and
    /// are never deduplicated by feature similarity.
    pub fn is_stack_failure(&self) -> bool {
        matches!(self, ViolationKind::StackFailure)
    }

    /// Parse the tag produced by [`fmt::Display`]; used when loading a
    /// baseline snapshot.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "ComfortOracle" => Some(ViolationKind::Comfort),
            "SpeedingOracle" => Some(ViolationKind::Speeding),
            "LaneChangeOracle" => Some(ViolationKind::LaneChange),
            "ModuleDelayOracle" => Some(ViolationKind::ModuleDelay),
            "StackFailureOracle" => Some(ViolationKind::StackFailure),
            _ => None,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ViolationKind::Comfort => "ComfortOracle",
            ViolationKind::Speeding => "SpeedingOracle",
            ViolationKind::LaneChange => "LaneChangeOracle",
            ViolationKind::ModuleDelay => "ModuleDelayOracle",
            ViolationKind::StackFailure => "StackFailureOracle",
        };
        write!(f, "{tag}")
    }
}

/// Failure classes of the stack-failure oracle.  The class becomes the
/// violation's distinguishing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackFailureKind {
    RoutingNeverReceived,
    PredictionNeverReceived,
    PlanningNeverReceived,
    LocalizationNeverReceived,
    VehicleNeverMoved,
    DegenerateTrajectory,
    InsufficientData,
}

impl fmt::Display for StackFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            StackFailureKind::RoutingNeverReceived => "routing-never-received",
            StackFailureKind::PredictionNeverReceived => "prediction-never-received",
            StackFailureKind::PlanningNeverReceived => "planning-never-received",
            StackFailureKind::LocalizationNeverReceived => "localization-never-received",
            StackFailureKind::VehicleNeverMoved => "vehicle-never-moved",
            StackFailureKind::DegenerateTrajectory => "degenerate-trajectory",
            StackFailureKind::InsufficientData => "insufficient-data",
        };
        write!(f, "{tag}")
    }
}

/// One detected violation.
///
/// `distinguishing_key` groups violations by identity within a kind before
/// any clustering happens (a magnitude bucket, a pipeline-stage name, a
/// lane id).  `features` is the numeric vector the novelty filter clusters
/// on; `BTreeMap` keeps feature order deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub distinguishing_key: String,
    pub features: BTreeMap<String, f64>,
}

impl Violation {
    pub fn new(kind: ViolationKind, distinguishing_key: impl Into<String>) -> Self {
        Self {
            kind,
            distinguishing_key: distinguishing_key.into(),
            features: BTreeMap::new(),
        }
    }

    /// Attach one scalar feature.
    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.distinguishing_key)
    }
}
