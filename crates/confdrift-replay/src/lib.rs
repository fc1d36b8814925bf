//! Sandbox pool and replay orchestration for ConfDrift.
//!
//! This crate owns everything between "here is a candidate configuration"
//! and "here are the recordings it produced":
//!
//! 1. **[`sandbox`]** — The control surface one stack instance exposes
//! 2. **[`scenario`]** — Recorded drives, baselines, the reserve roster
//! 3. **[`replay`]** — One scenario through one sandbox, with deadline
//! 4. **[`orchestrator`]** — Chunked fan-out over the pool
//! 5. **[`command`]** — Manifest-driven command-template backend
//! 6. **[`recording`]** — JSON-lines reader for the recorder's output
//!
//! # Concurrency
//!
//! Replays are the only parallel region of a campaign.  A batch is cut
//! into chunks no larger than the pool; each chunk joins before the next
//! starts, and a sandbox never runs two replays at once:
//!
//! ```text
//! scenarios  [s0 s1 s2 s3 s4]   pool of 2
//! chunk 1    s0→sandbox-0  s1→sandbox-1   ── join ──
//! chunk 2    s2→sandbox-0  s3→sandbox-1   ── join ──
//! chunk 3    s4→sandbox-0                 ── join ──
//! ```
//!
//! A replay failure never aborts its batch: timeouts keep their partial
//! recording and crashes score as an absent recording.

pub mod command;
pub mod orchestrator;
pub mod recording;
pub mod replay;
pub mod sandbox;
pub mod scenario;

// Re-export main types for convenience
pub use command::{CommandSandbox, SandboxSpec};
pub use orchestrator::{ExecutionOrchestrator, ReplayError, ScenarioReplay};
pub use recording::JsonlRecordingReader;
pub use replay::{replay_one, ReplayConfig, ReplayOutcome};
pub use sandbox::{Sandbox, SandboxError};
pub use scenario::{Scenario, ScenarioSet};
