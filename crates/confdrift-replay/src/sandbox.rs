//! The sandbox seam: one isolated instance of the driving stack.
//!
//! A sandbox is whatever backend runs the stack in isolation (a container,
//! a VM, a process group).  The harness only needs the handful of verbs
//! below; everything backend-specific stays behind the trait, which keeps
//! the orchestrator testable against scripted stand-ins.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::scenario::Scenario;

/// Errors surfaced by a sandbox backend.
///
/// Any of these during a replay marks the replay as crashed; the harness
/// never retries inside a replay.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Backend-specific failure (container runtime, control socket, ...).
    #[error("sandbox backend: {0}")]
    Backend(String),
    #[error("sandbox io: {0}")]
    Io(#[from] std::io::Error),
}

/// Control surface of one stack instance.
///
/// Implementations must be `Send`: each sandbox in the pool is driven from
/// its own worker thread during a batch.  Calls on a single sandbox are
/// never concurrent.
pub trait Sandbox: Send {
    /// Stable name for logs ("sandbox-0", a container id, ...).
    fn name(&self) -> &str;

    /// Clear telemetry state left over from the previous replay.
    fn reset(&mut self) -> Result<(), SandboxError>;

    /// Install `config` as the stack's live configuration tree.  The whole
    /// tree is swapped; backends must not merge into an existing one.
    fn apply_config(&mut self, config: &Value) -> Result<(), SandboxError>;

    /// Boot the stack and begin playing back the scenario's recording.
    fn start(&mut self, scenario: &Scenario) -> Result<(), SandboxError>;

    /// Whether the stack process is still running playback.
    fn is_alive(&mut self) -> Result<bool, SandboxError>;

    /// Begin capturing the stack's output channels under `label`.
    fn start_recording(&mut self, label: &str) -> Result<(), SandboxError>;

    /// Stop capturing and return the recording produced so far.
    fn stop_recording(&mut self) -> Result<PathBuf, SandboxError>;

    /// Force-stop the stack.  Must be safe to call when nothing runs.
    fn kill(&mut self) -> Result<(), SandboxError>;
}
