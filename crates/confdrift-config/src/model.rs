//! Configuration tree loading and the flat option model.
//!
//! The stack's configuration is a nested JSON tree.  [`ConfigModel`] walks
//! it once at load time, depth-first with keys visited in sorted order, and
//! assigns each leaf a stable id equal to its position in that traversal.
//! Every other component addresses options by id, so this ordering is the
//! contract the whole run relies on.

use std::fs;
use std::path::Path;

use log::info;
use serde_json::Value;
use thiserror::Error;

use crate::options::{classify_leaf, OptionKind, TunableOption};

/// Errors raised while loading or re-rendering the configuration tree.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration tree: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration tree is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("configuration tree root must be an object")]
    RootNotObject,

    #[error("unclassifiable leaf value at {path}")]
    UnclassifiableLeaf { path: String },

    #[error("value vector has {got} entries, model has {want} options")]
    ValueCountMismatch { got: usize, want: usize },
}

/// The flat, typed view of every tunable option in the configuration tree.
///
/// Immutable once loaded.  Also keeps the pristine tree so a value vector
/// can be rendered back into a full configuration for the whole-tree swap.
#[derive(Debug, Clone)]
pub struct ConfigModel {
    options: Vec<TunableOption>,
    tree: Value,
}

impl ConfigModel {
    /// Load a configuration tree from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Load a configuration tree from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let tree: Value = serde_json::from_str(text)?;
        Self::from_tree(tree)
    }

    /// Build the option list from an already-parsed tree.
    pub fn from_tree(tree: Value) -> Result<Self, ConfigError> {
        if !tree.is_object() {
            return Err(ConfigError::RootNotObject);
        }
        let mut options = Vec::new();
        collect_leaves(&tree, &mut Vec::new(), &mut options)?;
        info!("loaded {} tunable options", options.len());
        Ok(Self { options, tree })
    }

    /// Number of tunable options.
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    /// Look up an option by its stable id.
    pub fn option_at(&self, id: usize) -> Option<&TunableOption> {
        self.options.get(id)
    }

    /// All options, in id order.
    pub fn options(&self) -> &[TunableOption] {
        &self.options
    }

    /// The default value of every option, in id order.
    pub fn default_values(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|o| o.default_value.clone())
            .collect()
    }

    /// Render a value vector back into a full configuration tree.
    ///
    /// The result replaces every leaf of the pristine tree with the
    /// corresponding entry of `values`; leaves are re-encoded per their
    /// declared type where the value still parses, and fall back to a JSON
    /// string otherwise (mutated strings stay strings either way).
    pub fn render(&self, values: &[String]) -> Result<Value, ConfigError> {
        if values.len() != self.options.len() {
            return Err(ConfigError::ValueCountMismatch {
                got: values.len(),
                want: self.options.len(),
            });
        }
        let mut next_id = 0usize;
        let mut tree = self.tree.clone();
        fill_leaves(&mut tree, values, &self.options, &mut next_id);
        Ok(tree)
    }
}

/// Depth-first traversal, keys in sorted order, leaves in id order.
fn collect_leaves(
    value: &Value,
    path: &mut Vec<String>,
    out: &mut Vec<TunableOption>,
) -> Result<(), ConfigError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                path.push(key.clone());
                collect_leaves(&map[key], path, out)?;
                path.pop();
            }
            Ok(())
        }
        leaf => {
            let (kind, default_value) =
                classify_leaf(leaf).ok_or_else(|| ConfigError::UnclassifiableLeaf {
                    path: path.join("."),
                })?;
            out.push(TunableOption {
                id: out.len(),
                key_path: path.clone(),
                kind,
                default_value,
            });
            Ok(())
        }
    }
}

/// Mirror of [`collect_leaves`]: same traversal, writing values back in.
fn fill_leaves(value: &mut Value, values: &[String], options: &[TunableOption], next_id: &mut usize) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                if let Some(child) = map.get_mut(&key) {
                    fill_leaves(child, values, options, next_id);
                }
            }
        }
        leaf => {
            let id = *next_id;
            *next_id += 1;
            if let (Some(raw), Some(option)) = (values.get(id), options.get(id)) {
                *leaf = encode_value(option.kind, raw);
            }
        }
    }
}

/// Re-encode a string value into the leaf representation for its kind.
fn encode_value(kind: OptionKind, raw: &str) -> Value {
    match kind {
        OptionKind::Boolean => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        OptionKind::Integer => match raw.parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(raw.to_string()),
        },
        OptionKind::Float => match raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            Some(n) => Value::Number(n),
            None => Value::String(raw.to_string()),
        },
        OptionKind::List => match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ Value::Array(_)) => parsed,
            _ => Value::String(raw.to_string()),
        },
        OptionKind::Str | OptionKind::EnumStr | OptionKind::ExponentNumber => {
            Value::String(raw.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> Value {
        json!({
            "planning": {
                "speed_limit": 15.5,
                "replan": true,
                "mode": "URBAN_ROAD"
            },
            "control": {
                "gains": [0.5, 0.2],
                "lookahead": "2.0e-1"
            }
        })
    }

    #[test]
    fn ids_follow_sorted_traversal_order() {
        let model = ConfigModel::from_tree(sample_tree()).unwrap();
        let paths: Vec<String> = model.options().iter().map(|o| o.dotted_path()).collect();
        assert_eq!(
            paths,
            vec![
                "control.gains",
                "control.lookahead",
                "planning.mode",
                "planning.replan",
                "planning.speed_limit",
            ]
        );
        for (i, option) in model.options().iter().enumerate() {
            assert_eq!(option.id, i);
        }
    }

    #[test]
    fn kinds_are_inferred_per_leaf() {
        let model = ConfigModel::from_tree(sample_tree()).unwrap();
        let kinds: Vec<OptionKind> = model.options().iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                OptionKind::List,
                OptionKind::ExponentNumber,
                OptionKind::EnumStr,
                OptionKind::Boolean,
                OptionKind::Float,
            ]
        );
    }

    #[test]
    fn unclassifiable_leaf_fails_the_load() {
        let err = ConfigModel::from_tree(json!({ "a": null })).unwrap_err();
        assert!(matches!(err, ConfigError::UnclassifiableLeaf { .. }));
    }

    #[test]
    fn non_object_root_is_rejected() {
        let err = ConfigModel::from_tree(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ConfigError::RootNotObject));
    }

    #[test]
    fn render_replaces_every_leaf() {
        let model = ConfigModel::from_tree(sample_tree()).unwrap();
        let mut values = model.default_values();
        values[4] = "99.5".to_string(); // planning.speed_limit
        values[3] = "false".to_string(); // planning.replan

        let tree = model.render(&values).unwrap();
        assert_eq!(tree["planning"]["speed_limit"], json!(99.5));
        assert_eq!(tree["planning"]["replan"], json!(false));
        assert_eq!(tree["control"]["gains"], json!([0.5, 0.2]));
    }

    #[test]
    fn render_rejects_wrong_value_count() {
        let model = ConfigModel::from_tree(sample_tree()).unwrap();
        let err = model.render(&["a".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::ValueCountMismatch { got: 1, want: 5 }));
    }

    #[test]
    fn defaults_roundtrip_through_render() {
        let model = ConfigModel::from_tree(sample_tree()).unwrap();
        let rendered = model.render(&model.default_values()).unwrap();
        let reloaded = ConfigModel::from_tree(rendered).unwrap();
        assert_eq!(model.default_values(), reloaded.default_values());
    }
}
