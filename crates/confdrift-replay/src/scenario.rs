//! Scenarios: the recorded drives a campaign replays.
//!
//! A scenario names one sensor recording and the map it was driven on.
//! Once the campaign has replayed it under the default configuration, the
//! scenario also carries its baseline: the violations the stack produces
//! on this drive *without* any mutation, which later findings are diffed
//! against.

use std::collections::BTreeSet;
use std::path::PathBuf;

use confdrift_oracle::{Violation, ViolationKind};

/// One recorded drive.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Stable id used in ledgers and reports.
    pub id: u64,
    /// Human-readable record name.
    pub name: String,
    /// Sensor recording played back into the stack.
    pub record_path: PathBuf,
    /// Map the recording was driven on.
    pub map_id: String,
    /// Violations the default configuration already produces, if
    /// established.
    baseline: Option<Vec<Violation>>,
}

impl Scenario {
    pub fn new(id: u64, name: impl Into<String>, record_path: PathBuf, map_id: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            record_path,
            map_id: map_id.into(),
            baseline: None,
        }
    }

    /// Whether the default-configuration replay has been scored yet.
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn set_baseline(&mut self, violations: Vec<Violation>) {
        self.baseline = Some(violations);
    }

    pub fn baseline(&self) -> &[Violation] {
        self.baseline.as_deref().unwrap_or(&[])
    }

    /// Identity set of the baseline: a violation whose `(kind, key)` pair
    /// appears here is something the stack does anyway, not a finding.
    pub fn baseline_identities(&self) -> BTreeSet<(ViolationKind, String)> {
        self.baseline()
            .iter()
            .map(|v| (v.kind, v.distinguishing_key.clone()))
            .collect()
    }
}

/// The active scenario roster plus the reserve it draws replacements from.
///
/// When a scenario turns out to be unusable (the stack fails on it even
/// while the campaign is establishing determinism), it is swapped out for
/// the next reserve scenario rather than poisoning every generation.
#[derive(Debug, Default)]
pub struct ScenarioSet {
    active: Vec<Scenario>,
    reserve: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn new(active: Vec<Scenario>, reserve: Vec<Scenario>) -> Self {
        Self { active, reserve }
    }

    pub fn active(&self) -> &[Scenario] {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut [Scenario] {
        &mut self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn reserve_len(&self) -> usize {
        self.reserve.len()
    }

    /// Replace the active scenario `id` with the next reserve scenario.
    ///
    /// Returns the newly promoted scenario (which has no baseline yet) or
    /// `None` when the reserve is exhausted or `id` is not active; in
    /// either of those cases the roster is unchanged.
    pub fn swap_out(&mut self, id: u64) -> Option<&mut Scenario> {
        let index = self.active.iter().position(|s| s.id == id)?;
        if self.reserve.is_empty() {
            return None;
        }
        let promoted = self.reserve.remove(0);
        self.active[index] = promoted;
        Some(&mut self.active[index])
    }
}
