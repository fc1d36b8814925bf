//! Violation oracles for recorded drives of the ConfDrift stack.
//!
//! This crate turns one telemetry recording into a set of [`Violation`]s
//! plus the scalar fitness signals the search layer consumes.  It knows
//! nothing about configurations or sandboxes; its only inputs are an
//! ordered event stream and a [`GeometryService`] for map lookups.
//!
//! # Pipeline
//!
//! ```text
//! recording ──→ RecordingReader ──→ [TelemetryEvent]
//!                                        │ sorted by timestamp
//!                                        ▼
//!                  ObservationState ← OracleEngine → per-oracle dispatch
//!                                        │
//!                                        ▼
//!                               RecordingAnalysis
//!                  (violations, stack_failed, branch/sinuosity signals)
//! ```
//!
//! # Module Structure
//!
//! - [`telemetry`] — Event model and the recording reader seam
//! - [`geometry`] — Map lookups behind [`GeometryService`]
//! - [`state`] — Shared per-recording observation state
//! - [`violation`] — Violation records and failure taxonomies
//! - [`oracles`] — The five concrete oracles
//! - [`engine`] — Dispatch, ordering, gating and pre-emption
//!
//! Stack failures pre-empt everything else in a replay, and a replay
//! without the minimum observable data reports nothing; both rules live in
//! [`engine::OracleEngine::analyze`], not in the individual oracles.

pub mod engine;
pub mod geometry;
pub mod oracles;
pub mod state;
pub mod telemetry;
pub mod violation;

// Re-export main types for convenience
pub use engine::{Oracle, OracleEngine, OracleError, RecordingAnalysis};
pub use geometry::{Footprint, GeometryService, LaneId, Point2};
pub use state::{ObservationState, MIN_DISTINCT_POSES};
pub use telemetry::{Message, Pose, RecordingReader, TelemetryEvent};
pub use violation::{StackFailureKind, Violation, ViolationKind};
