//! Per-option admissible mutation ranges.
//!
//! Ranges start wide and are narrowed monotonically as the search observes
//! directional moves: after a move away from the default, the interval is
//! halved on the side the move *came from*, never the side it is heading
//! toward.  The narrowed bound converges toward the default value and never
//! crosses it, so the untouched side of the default always stays
//! admissible.  The table is process-wide exploration memory for the whole
//! run, shared by every search strategy.

use std::fmt;

use crate::model::ConfigModel;
use crate::options::{split_exponent, OptionKind, TunableOption};

/// Minimum half-width of a fresh numeric range.
const MIN_NUMERIC_WIDTH: f64 = 10.0;

/// Multiplier on the default magnitude for a fresh numeric range.
const NUMERIC_WIDTH_FACTOR: f64 = 10.0;

/// Half-width of a fresh exponent range.
const EXPONENT_WIDTH: i64 = 6;

/// Admissible mutation interval for one option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionRange {
    /// Inclusive numeric interval for float/integer options.
    Numeric { low: f64, high: f64 },

    /// Inclusive interval over the exponent of an exponential-number
    /// option; the mantissa is never redrawn.
    Exponent { low: i64, high: i64 },

    /// Enumerated value set (booleans and enum strings).
    Choice(Vec<String>),

    /// No range tracking (plain strings, lists).
    Free,
}

impl OptionRange {
    /// Fresh wide range for an option.
    pub fn wide_default(option: &TunableOption) -> Self {
        match option.kind {
            OptionKind::Float | OptionKind::Integer => {
                let d = option.default_numeric().unwrap_or(0.0);
                let width = (d.abs() * NUMERIC_WIDTH_FACTOR).max(MIN_NUMERIC_WIDTH);
                OptionRange::Numeric {
                    low: d - width,
                    high: d + width,
                }
            }
            OptionKind::ExponentNumber => {
                let e = split_exponent(&option.default_value)
                    .map(|(_, e)| e)
                    .unwrap_or(0);
                OptionRange::Exponent {
                    low: e - EXPONENT_WIDTH,
                    high: e + EXPONENT_WIDTH,
                }
            }
            OptionKind::Boolean => {
                OptionRange::Choice(vec!["true".to_string(), "false".to_string()])
            }
            OptionKind::EnumStr => OptionRange::Choice(vec![option.default_value.clone()]),
            OptionKind::Str | OptionKind::List => OptionRange::Free,
        }
    }
}

impl fmt::Display for OptionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionRange::Numeric { low, high } => write!(f, "[{low}, {high}]"),
            OptionRange::Exponent { low, high } => write!(f, "exp [{low}, {high}]"),
            OptionRange::Choice(values) => write!(f, "{{{}}}", values.join(", ")),
            OptionRange::Free => write!(f, "(free)"),
        }
    }
}

/// The shared per-option range table.
///
/// The only long-lived mutable state of a run; updated once per mutation
/// application, between generations, under the single-writer discipline.
#[derive(Debug, Clone)]
pub struct RangeTable {
    ranges: Vec<OptionRange>,
}

impl RangeTable {
    /// Wide default ranges for every option of the model.
    pub fn for_model(model: &ConfigModel) -> Self {
        Self {
            ranges: model.options().iter().map(OptionRange::wide_default).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Current range of one option.
    pub fn range(&self, option_id: usize) -> Option<&OptionRange> {
        self.ranges.get(option_id)
    }

    /// Replace the range of one option wholesale.  Used when restoring a
    /// saved run; out-of-bounds ids are ignored.
    pub fn set_range(&mut self, option_id: usize, range: OptionRange) {
        if let Some(slot) = self.ranges.get_mut(option_id) {
            *slot = range;
        }
    }

    /// Record a directional move and halve the side it came from.
    ///
    /// An upward move pulls `low` to the midpoint of (low, default); a
    /// downward move pulls `high` to the midpoint of (high, default).  The
    /// side the move is heading toward is never shrunk, and the default
    /// itself always stays admissible.  Non-directional kinds (booleans,
    /// enums, strings, lists) are untouched.
    pub fn narrow(&mut self, option: &TunableOption, from: &str, to: &str) {
        let Some(range) = self.ranges.get_mut(option.id) else {
            return;
        };
        match range {
            OptionRange::Numeric { low, high } => {
                let (Ok(from), Ok(to)) = (from.parse::<f64>(), to.parse::<f64>()) else {
                    return;
                };
                let Some(d) = option.default_numeric() else {
                    return;
                };
                if to > from {
                    *low = f64::max(*low, midpoint(*low, d));
                } else if to < from {
                    *high = f64::min(*high, midpoint(*high, d));
                }
            }
            OptionRange::Exponent { low, high } => {
                let (Some((_, from)), Some((_, to))) = (split_exponent(from), split_exponent(to))
                else {
                    return;
                };
                let d = split_exponent(&option.default_value)
                    .map(|(_, e)| e)
                    .unwrap_or(0);
                if to > from {
                    *low = (*low).max((midpoint(*low as f64, d as f64)).floor() as i64);
                } else if to < from {
                    *high = (*high).min((midpoint(*high as f64, d as f64)).ceil() as i64);
                }
            }
            OptionRange::Choice(_) | OptionRange::Free => {}
        }
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}
