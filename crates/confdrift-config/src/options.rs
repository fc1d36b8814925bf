//! Tunable option definitions.
//!
//! Every leaf of the stack's configuration tree becomes one [`TunableOption`]
//! with a declared type inferred from its default value.  Options are
//! immutable once loaded and are identified by their position in the
//! flattened tree traversal, so an id always denotes the same option for
//! the life of a run.

use std::fmt;

use serde_json::Value;

/// Declared type of a tunable option, inferred from its default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Floating-point number with a fractional part (`0.25`, `"3.50"`).
    Float,

    /// Whole number (`3`, `"-20"`).
    Integer,

    /// `true` / `false`, possibly string-encoded.
    Boolean,

    /// Free-form text.
    Str,

    /// All-caps identifier, typically one of a closed set (`"LIDAR_ONLY"`).
    EnumStr,

    /// Scientific notation encoded as `<mantissa>e<exponent>` (`"1.0e-5"`).
    ExponentNumber,

    /// Array of scalar values, stored as a compact JSON array string.
    List,
}

impl OptionKind {
    /// Whether mutation draws for this kind are bounded by a numeric range.
    pub fn is_numeric(&self) -> bool {
        matches!(self, OptionKind::Float | OptionKind::Integer)
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            OptionKind::Float => "float",
            OptionKind::Integer => "integer",
            OptionKind::Boolean => "boolean",
            OptionKind::Str => "string",
            OptionKind::EnumStr => "enum-string",
            OptionKind::ExponentNumber => "exponent-number",
            OptionKind::List => "list",
        };
        write!(f, "{tag}")
    }
}

/// One tunable option extracted from the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TunableOption {
    /// Stable id: position in the flattened tree traversal.
    pub id: usize,
    /// Keys from the tree root down to this leaf.
    pub key_path: Vec<String>,
    /// Declared type inferred at load time.
    pub kind: OptionKind,
    /// Default value, string-encoded.
    pub default_value: String,
}

impl TunableOption {
    /// Dotted key path, used in logs and reports.
    pub fn dotted_path(&self) -> String {
        self.key_path.join(".")
    }

    /// Default value parsed as a float, if this option is numeric.
    pub fn default_numeric(&self) -> Option<f64> {
        if self.kind.is_numeric() {
            self.default_value.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for TunableOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}) = {}",
            self.id,
            self.dotted_path(),
            self.kind,
            self.default_value
        )
    }
}

/// Classify a leaf of the configuration tree.
///
/// Returns the inferred kind plus the canonical string encoding of the
/// default value, or `None` if the leaf cannot be classified (null, or an
/// array with non-scalar elements).  String leaves are classified by
/// content, so `"true"`, `"3.5"` and `"1e-4"` land on boolean, float and
/// exponent-number rather than on plain strings.
pub(crate) fn classify_leaf(value: &Value) -> Option<(OptionKind, String)> {
    match value {
        Value::Bool(b) => Some((OptionKind::Boolean, b.to_string())),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Some((OptionKind::Integer, n.to_string()))
            } else {
                Some((OptionKind::Float, n.to_string()))
            }
        }
        Value::String(s) => Some(classify_text(s)),
        Value::Array(items) => {
            if items
                .iter()
                .all(|v| !matches!(v, Value::Array(_) | Value::Object(_) | Value::Null))
            {
                // Compact JSON keeps the element types round-trippable.
                serde_json::to_string(value)
                    .ok()
                    .map(|encoded| (OptionKind::List, encoded))
            } else {
                None
            }
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// Classify a string-encoded leaf by its content.
fn classify_text(s: &str) -> (OptionKind, String) {
    if s == "true" || s == "false" {
        return (OptionKind::Boolean, s.to_string());
    }
    if split_exponent(s).is_some() {
        return (OptionKind::ExponentNumber, s.to_string());
    }
    if s.parse::<i64>().is_ok() {
        return (OptionKind::Integer, s.to_string());
    }
    if s.contains('.') && s.parse::<f64>().is_ok() {
        return (OptionKind::Float, s.to_string());
    }
    if is_enum_identifier(s) {
        return (OptionKind::EnumStr, s.to_string());
    }
    (OptionKind::Str, s.to_string())
}

/// Split a `<mantissa>e<exponent>` literal into its two parts.
///
/// Both parts must be plain numbers (`1.0e-5`, `2e3`); anything else is not
/// an exponential-number option.
pub fn split_exponent(s: &str) -> Option<(String, i64)> {
    let idx = s.find(['e', 'E'])?;
    let (mantissa, rest) = s.split_at(idx);
    let exponent = rest[1..].parse::<i64>().ok()?;
    if mantissa.is_empty() || mantissa.parse::<f64>().is_err() {
        return None;
    }
    Some((mantissa.to_string(), exponent))
}

/// Number of digits after the decimal point in a float literal.
pub fn float_decimals(s: &str) -> usize {
    match s.split_once('.') {
        Some((_, frac)) => frac.chars().take_while(|c| c.is_ascii_digit()).count(),
        None => 0,
    }
}

fn is_enum_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
