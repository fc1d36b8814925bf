//! Immutable configuration snapshots with mutation lineage.

use std::collections::BTreeSet;

use crate::model::ConfigModel;

/// One applied mutation, kept in a configuration's lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMutation {
    pub option_id: usize,
    pub previous: String,
    pub next: String,
    /// Operator name, e.g. `"uniform-draw"` or `"char-substitution"`.
    pub operator: &'static str,
}

/// A full value assignment for every tunable option.
///
/// Configurations are value objects: nothing mutates one in place.  Every
/// change goes through [`Configuration::with_value`] (or
/// [`Configuration::crossover`]) and produces a new snapshot, so an earlier
/// generation's individuals can never be corrupted by a later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    values: Vec<String>,
    lineage: Vec<AppliedMutation>,
}

impl Configuration {
    /// The unmodified default configuration.
    pub fn defaults(model: &ConfigModel) -> Self {
        Self {
            values: model.default_values(),
            lineage: Vec::new(),
        }
    }

    /// All values, in option-id order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// The value of one option.
    pub fn value(&self, option_id: usize) -> Option<&str> {
        self.values.get(option_id).map(String::as_str)
    }

    /// Mutations applied since the defaults, oldest first.
    pub fn lineage(&self) -> &[AppliedMutation] {
        &self.lineage
    }

    /// Whether this is the untouched default configuration.
    pub fn is_default(&self) -> bool {
        self.lineage.is_empty()
    }

    /// A new snapshot with one option changed and the move recorded.
    pub fn with_value(&self, option_id: usize, next: String, operator: &'static str) -> Self {
        let mut values = self.values.clone();
        let previous = match values.get_mut(option_id) {
            Some(slot) => std::mem::replace(slot, next.clone()),
            None => return self.clone(),
        };
        let mut lineage = self.lineage.clone();
        lineage.push(AppliedMutation {
            option_id,
            previous,
            next,
            operator,
        });
        Self { values, lineage }
    }

    /// Single-point crossover: values `[0, cut)` from `a`, the rest from
    /// `b`.  Lineage entries follow the half their option came from, so the
    /// child's history stays attributable.
    pub fn crossover(a: &Configuration, b: &Configuration, cut: usize) -> Self {
        let cut = cut.min(a.values.len());
        let mut values = a.values[..cut].to_vec();
        values.extend_from_slice(&b.values[cut..]);

        let mut lineage: Vec<AppliedMutation> = a
            .lineage
            .iter()
            .filter(|m| m.option_id < cut)
            .cloned()
            .collect();
        lineage.extend(b.lineage.iter().filter(|m| m.option_id >= cut).cloned());
        Self { values, lineage }
    }

    /// Distinct option ids touched by this configuration's lineage,
    /// ascending.  These are the "implicated options" in the ledger.
    pub fn touched_options(&self) -> Vec<usize> {
        let ids: BTreeSet<usize> = self.lineage.iter().map(|m| m.option_id).collect();
        ids.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> ConfigModel {
        ConfigModel::from_tree(json!({
            "a": 1,
            "b": 2.5,
            "c": "true",
            "d": "text"
        }))
        .unwrap()
    }

    #[test]
    fn with_value_leaves_the_original_untouched() {
        let base = Configuration::defaults(&model());
        let mutated = base.with_value(0, "9".to_string(), "uniform-draw");

        assert_eq!(base.value(0), Some("1"));
        assert_eq!(mutated.value(0), Some("9"));
        assert!(base.lineage().is_empty());
        assert_eq!(mutated.lineage().len(), 1);
        assert_eq!(mutated.lineage()[0].previous, "1");
    }

    #[test]
    fn lineage_accumulates_across_snapshots() {
        let base = Configuration::defaults(&model());
        let second = base
            .with_value(0, "9".to_string(), "uniform-draw")
            .with_value(2, "false".to_string(), "flip");

        assert_eq!(second.lineage().len(), 2);
        assert_eq!(second.touched_options(), vec![0, 2]);
    }

    #[test]
    fn crossover_splices_values_and_lineage() {
        let m = model();
        let left = Configuration::defaults(&m).with_value(0, "7".to_string(), "uniform-draw");
        let right = Configuration::defaults(&m).with_value(3, "txet".to_string(), "transposition");

        let child = Configuration::crossover(&left, &right, 2);
        assert_eq!(child.value(0), Some("7"));
        assert_eq!(child.value(3), Some("txet"));
        assert_eq!(child.touched_options(), vec![0, 3]);

        // Lineage from the unused halves does not leak in.
        let other = Configuration::crossover(&right, &left, 2);
        assert_eq!(other.value(0), Some("1"));
        assert_eq!(other.value(3), Some("text"));
        assert!(other.touched_options().is_empty());
    }

    #[test]
    fn out_of_range_option_id_is_a_noop() {
        let base = Configuration::defaults(&model());
        let same = base.with_value(99, "x".to_string(), "uniform-draw");
        assert_eq!(base, same);
    }
}
