//! Per-option value mutation — generates perturbed values by declared type.

use confdrift_config::{
    float_decimals, split_exponent, Configuration, OptionKind, OptionRange, RangeTable,
    TunableOption,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Generates mutated values for single options.
///
/// Mutations are deterministic given the same master seed: each call
/// derives a child seed from an internal counter, so replaying a campaign
/// with the same seed reproduces every draw.
pub struct MutationEngine {
    /// Master seed for deterministic mutation.
    seed: u64,
    /// Counter for generating unique child seeds.
    counter: u64,
}

impl MutationEngine {
    pub fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    /// Rebuild an engine mid-sequence; `counter` comes from a saved run.
    pub fn resume(seed: u64, counter: u64) -> Self {
        Self { seed, counter }
    }

    /// Number of child seeds drawn so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Mutate one option's current value within its admissible range.
    ///
    /// Returns the new value and the operator tag recorded in lineage.
    /// Kinds the engine cannot perturb come back unchanged.
    pub fn mutate(
        &mut self,
        option: &TunableOption,
        current: &str,
        range: &OptionRange,
    ) -> (String, &'static str) {
        let child_seed = self.seed.wrapping_add(self.counter);
        self.counter += 1;
        let mut rng = ChaCha8Rng::seed_from_u64(child_seed);
        mutate_with(&mut rng, option, current, range)
    }

    /// Mutate `option` within `base`, narrowing the shared range table when
    /// the draw actually moved the value.
    ///
    /// This is the one place a mutation application touches the table, so
    /// every strategy shares the same exploration memory.
    pub fn mutate_configuration(
        &mut self,
        option: &TunableOption,
        base: &Configuration,
        table: &mut RangeTable,
    ) -> Configuration {
        let Some(current) = base.value(option.id) else {
            return base.clone();
        };
        let current = current.to_string();
        let range = table
            .range(option.id)
            .cloned()
            .unwrap_or(OptionRange::Free);
        let (next, operator) = self.mutate(option, &current, &range);
        if next == current {
            return base.clone();
        }
        table.narrow(option, &current, &next);
        base.with_value(option.id, next, operator)
    }
}

fn mutate_with(
    rng: &mut ChaCha8Rng,
    option: &TunableOption,
    current: &str,
    range: &OptionRange,
) -> (String, &'static str) {
    match option.kind {
        OptionKind::Float => mutate_float(rng, option, current, range),
        OptionKind::Integer => mutate_integer(rng, current, range),
        OptionKind::Boolean => mutate_boolean(current),
        OptionKind::ExponentNumber => mutate_exponent(rng, current, range),
        OptionKind::Str | OptionKind::EnumStr => mutate_string(rng, current),
        OptionKind::List => mutate_list(rng, current),
    }
}

fn unchanged(current: &str) -> (String, &'static str) {
    (current.to_string(), "unchanged")
}

fn mutate_float(
    rng: &mut ChaCha8Rng,
    option: &TunableOption,
    current: &str,
    range: &OptionRange,
) -> (String, &'static str) {
    let OptionRange::Numeric { low, high } = range else {
        return unchanged(current);
    };
    let drawn: f64 = rng.gen_range(*low..=*high);
    // Preserve the default's decimal precision so the stack's parser sees
    // values shaped like the ones it ships with.
    let decimals = float_decimals(&option.default_value);
    (format!("{drawn:.decimals$}"), "uniform-draw")
}

fn mutate_integer(rng: &mut ChaCha8Rng, current: &str, range: &OptionRange) -> (String, &'static str) {
    let OptionRange::Numeric { low, high } = range else {
        return unchanged(current);
    };
    let (lo, hi) = (low.ceil() as i64, high.floor() as i64);
    if lo > hi {
        return unchanged(current);
    }
    (rng.gen_range(lo..=hi).to_string(), "uniform-draw")
}

fn mutate_boolean(current: &str) -> (String, &'static str) {
    let flipped = if current == "true" { "false" } else { "true" };
    (flipped.to_string(), "flip")
}

fn mutate_exponent(rng: &mut ChaCha8Rng, current: &str, range: &OptionRange) -> (String, &'static str) {
    let (OptionRange::Exponent { low, high }, Some((mantissa, _))) =
        (range, split_exponent(current))
    else {
        return unchanged(current);
    };
    let exponent = rng.gen_range(*low..=*high);
    (format!("{mantissa}e{exponent}"), "exponent-draw")
}

/// String mutation: flip the known antonym pairs directly, otherwise apply
/// one of the seven character-level operators.
fn mutate_string(rng: &mut ChaCha8Rng, current: &str) -> (String, &'static str) {
    match current {
        "min" => return ("max".to_string(), "pair-flip"),
        "max" => return ("min".to_string(), "pair-flip"),
        "yes" => return ("no".to_string(), "pair-flip"),
        "no" => return ("yes".to_string(), "pair-flip"),
        _ => {}
    }

    let mut chars: Vec<char> = current.chars().collect();
    match rng.gen_range(0..7u8) {
        0 => {
            if chars.is_empty() {
                return unchanged(current);
            }
            let index = rng.gen_range(0..chars.len());
            chars[index] = rng.gen_range(b'a'..=b'z') as char;
            (chars.into_iter().collect(), "char-substitution")
        }
        1 => {
            let index = rng.gen_range(0..=chars.len());
            chars.insert(index, rng.gen_range(b'a'..=b'z') as char);
            (chars.into_iter().collect(), "char-insertion")
        }
        2 => {
            if chars.is_empty() {
                return unchanged(current);
            }
            let index = rng.gen_range(0..chars.len());
            chars.remove(index);
            (chars.into_iter().collect(), "char-deletion")
        }
        3 => {
            if chars.is_empty() {
                return unchanged(current);
            }
            let index = rng.gen_range(0..chars.len());
            let c = chars[index];
            chars[index] = if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            };
            (chars.into_iter().collect(), "case-flip")
        }
        4 => {
            if chars.len() < 2 {
                return unchanged(current);
            }
            let index = rng.gen_range(0..chars.len() - 1);
            chars.swap(index, index + 1);
            (chars.into_iter().collect(), "transposition")
        }
        5 => {
            chars.truncate(chars.len() / 2);
            (chars.into_iter().collect(), "truncate-half")
        }
        _ => (format!("{current}{current}"), "duplication"),
    }
}

/// List mutation over the compact-JSON list encoding: drop one element or
/// append the whole list to itself.
fn mutate_list(rng: &mut ChaCha8Rng, current: &str) -> (String, &'static str) {
    let Ok(serde_json::Value::Array(mut items)) = serde_json::from_str(current) else {
        return unchanged(current);
    };
    if !items.is_empty() && rng.gen_bool(0.5) {
        let index = rng.gen_range(0..items.len());
        items.remove(index);
        match serde_json::to_string(&serde_json::Value::Array(items)) {
            Ok(encoded) => (encoded, "list-drop"),
            Err(_) => unchanged(current),
        }
    } else {
        let mut doubled = items.clone();
        doubled.extend(items);
        match serde_json::to_string(&serde_json::Value::Array(doubled)) {
            Ok(encoded) => (encoded, "list-duplicate"),
            Err(_) => unchanged(current),
        }
    }
}
