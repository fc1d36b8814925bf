//! The standard oracle bank.
//!
//! - [`comfort`] — longitudinal acceleration limits
//! - [`speeding`] — lane speed limits
//! - [`lane_boundary`] — prolonged lane-boundary straddling
//! - [`module_delay`] — pipeline-stage message gaps
//! - [`stack_failure`] — module-level failure classifier (pre-empting)

pub mod comfort;
pub mod lane_boundary;
pub mod module_delay;
pub mod speeding;
pub mod stack_failure;

pub use comfort::ComfortOracle;
pub use lane_boundary::LaneBoundaryOracle;
pub use module_delay::{ModuleDelayOracle, Stage};
pub use speeding::SpeedingOracle;
pub use stack_failure::StackFailureOracle;
