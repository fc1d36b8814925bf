//! Snapshot save/load for resumable fuzzing campaigns.
//!
//! Saves the minimal state needed to resume a campaign:
//! - Per-scenario baseline violations
//! - The narrowed per-option range table
//! - Progress counters
//! - Configuration
//!
//! The population is NOT saved because survivors are cheap to re-derive.
//! Baselines are the expensive part (each one costs a full replay under
//! the default configuration), so on resume we re-bootstrap the population
//! but carry the baselines, the narrowed ranges and the mutation counter
//! forward, and the child-seed sequence continues where it stopped.

use confdrift_config::OptionRange;
use confdrift_oracle::{Violation, ViolationKind};
use confdrift_replay::Scenario;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Errors from snapshot operations.
#[derive(Debug, Snafu)]
pub enum SnapshotError {
    #[snafu(display("I/O error"), context(false))]
    Io { source: std::io::Error },

    #[snafu(display("JSON error"), context(false))]
    Json { source: serde_json::Error },

    #[snafu(display("unknown violation kind tag `{kind}`"))]
    UnknownKind { kind: String },
}

/// Configuration subset needed to resume a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub seed: u64,
    pub population_size: usize,
    pub max_generations: u64,
    pub strategy: String,
    pub combinatorial_strength: usize,
    pub confirm_runs: usize,
    pub confirm_majority: usize,
}

/// Serializable violation representation.  The kind is stored as its
/// display tag so snapshot files stay greppable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableViolation {
    pub kind: String,
    pub key: String,
    pub features: BTreeMap<String, f64>,
}

impl From<&Violation> for SerializableViolation {
    fn from(violation: &Violation) -> Self {
        SerializableViolation {
            kind: violation.kind.to_string(),
            key: violation.distinguishing_key.clone(),
            features: violation.features.clone(),
        }
    }
}

impl SerializableViolation {
    /// Rebuild the violation, rejecting unknown kind tags.
    pub fn to_violation(&self) -> Result<Violation, SnapshotError> {
        let Some(kind) = ViolationKind::parse(&self.kind) else {
            return Err(SnapshotError::UnknownKind {
                kind: self.kind.clone(),
            });
        };
        let mut violation = Violation::new(kind, self.key.clone());
        for (name, value) in &self.features {
            violation = violation.with_feature(name, *value);
        }
        Ok(violation)
    }
}

/// Serializable per-scenario baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableBaseline {
    pub scenario_id: u64,
    pub scenario_name: String,
    pub violations: Vec<SerializableViolation>,
}

impl SerializableBaseline {
    /// Capture a scenario's established baseline, if it has one.
    pub fn capture(scenario: &Scenario) -> Option<Self> {
        if !scenario.has_baseline() {
            return None;
        }
        Some(SerializableBaseline {
            scenario_id: scenario.id,
            scenario_name: scenario.name.clone(),
            violations: scenario.baseline().iter().map(Into::into).collect(),
        })
    }

    /// Rebuild the baseline violation list.
    pub fn restore(&self) -> Result<Vec<Violation>, SnapshotError> {
        self.violations
            .iter()
            .map(SerializableViolation::to_violation)
            .collect()
    }
}

/// Serializable mutation-range representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SerializableRange {
    Numeric { low: f64, high: f64 },
    Exponent { low: i64, high: i64 },
    Choice { values: Vec<String> },
    Free,
}

impl From<&OptionRange> for SerializableRange {
    fn from(range: &OptionRange) -> Self {
        match range {
            OptionRange::Numeric { low, high } => SerializableRange::Numeric {
                low: *low,
                high: *high,
            },
            OptionRange::Exponent { low, high } => SerializableRange::Exponent {
                low: *low,
                high: *high,
            },
            OptionRange::Choice(values) => SerializableRange::Choice {
                values: values.clone(),
            },
            OptionRange::Free => SerializableRange::Free,
        }
    }
}

impl From<&SerializableRange> for OptionRange {
    fn from(range: &SerializableRange) -> Self {
        match range {
            SerializableRange::Numeric { low, high } => OptionRange::Numeric {
                low: *low,
                high: *high,
            },
            SerializableRange::Exponent { low, high } => OptionRange::Exponent {
                low: *low,
                high: *high,
            },
            SerializableRange::Choice { values } => OptionRange::Choice(values.clone()),
            SerializableRange::Free => OptionRange::Free,
        }
    }
}

/// Complete snapshot — everything needed to resume a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    pub config: SnapshotConfig,
    pub baselines: Vec<SerializableBaseline>,
    pub ranges: Vec<SerializableRange>,
    pub generations_completed: u64,
    pub total_replays: u64,
    pub confirmed_total: usize,
    pub quarantined_total: usize,
    pub mutation_counter: u64,
}

/// Save a snapshot to a JSON file.
pub fn save_snapshot<P: AsRef<Path>>(
    path: P,
    snapshot: &CampaignSnapshot,
) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load a snapshot from a JSON file.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<CampaignSnapshot, SnapshotError> {
    let json = fs::read_to_string(path)?;
    let snapshot = serde_json::from_str(&json)?;
    Ok(snapshot)
}
