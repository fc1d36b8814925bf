//! Typed configuration model for the ConfDrift fuzzer.
//!
//! The vehicle stack's configuration is a nested tree of scalar settings.
//! This crate flattens that tree into a typed option list with stable ids,
//! provides immutable configuration snapshots with mutation lineage, and
//! tracks the per-option admissible mutation ranges the search narrows over
//! a run.
//!
//! - [`options`] — Option kinds and leaf classification
//! - [`model`] — Tree loading, stable-id traversal, tree re-rendering
//! - [`configuration`] — Immutable value snapshots + lineage
//! - [`range`] — Wide-default ranges and directional narrowing

pub mod configuration;
pub mod model;
pub mod options;
pub mod range;

pub use configuration::{AppliedMutation, Configuration};
pub use model::{ConfigError, ConfigModel};
pub use options::{float_decimals, split_exponent, OptionKind, TunableOption};
pub use range::{OptionRange, RangeTable};
