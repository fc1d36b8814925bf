//! Driving one scenario through one sandbox.
//!
//! A replay is a fixed sequence: reset, apply configuration, start the
//! stack, start recording, then poll until the stack finishes playback or
//! the deadline passes.  Every sandbox error folds into a `Crashed`
//! outcome rather than propagating; a crash is a result the search layer
//! scores, not a harness failure.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::Value;

use crate::sandbox::{Sandbox, SandboxError};
use crate::scenario::Scenario;

/// Timing knobs of a single replay.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// How long scenario playback is allowed to run.
    pub max_record_time: Duration,
    /// Extra allowance for the stack to boot before playback counts.
    pub startup_grace: Duration,
    /// Liveness poll interval.
    pub poll_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_record_time: Duration::from_secs(120),
            startup_grace: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl ReplayConfig {
    /// Replay deadline measured from stack start.
    pub fn deadline(&self) -> Duration {
        self.max_record_time + self.startup_grace
    }
}

/// Terminal state of one replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Playback ran to completion; the recording is complete.
    Completed { recording: PathBuf },
    /// The deadline passed.  Whatever partial recording exists is kept
    /// and scored like any other.
    TimedOut { recording: Option<PathBuf> },
    /// A sandbox operation failed mid-replay.
    Crashed { reason: String },
}

impl ReplayOutcome {
    /// The recording to analyze, when one exists.
    pub fn recording(&self) -> Option<&PathBuf> {
        match self {
            ReplayOutcome::Completed { recording } => Some(recording),
            ReplayOutcome::TimedOut { recording } => recording.as_ref(),
            ReplayOutcome::Crashed { .. } => None,
        }
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, ReplayOutcome::Crashed { .. })
    }
}

/// Run `scenario` on `sandbox` under an already-rendered configuration.
///
/// Infallible by design: every failure path becomes an outcome, and the
/// sandbox is force-killed before returning no matter how the replay
/// ended.
pub fn replay_one(
    config: &ReplayConfig,
    sandbox: &mut dyn Sandbox,
    scenario: &Scenario,
    rendered: &Value,
) -> ReplayOutcome {
    let outcome = match drive(config, sandbox, scenario, rendered) {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(
                "{}: replay of '{}' crashed: {error}",
                sandbox.name(),
                scenario.name
            );
            ReplayOutcome::Crashed {
                reason: error.to_string(),
            }
        }
    };
    // Best-effort cleanup in every case, including clean completion.
    if let Err(error) = sandbox.kill() {
        warn!("{}: cleanup kill failed: {error}", sandbox.name());
    }
    outcome
}

fn drive(
    config: &ReplayConfig,
    sandbox: &mut dyn Sandbox,
    scenario: &Scenario,
    rendered: &Value,
) -> Result<ReplayOutcome, SandboxError> {
    debug!("{}: resetting for '{}'", sandbox.name(), scenario.name);
    sandbox.reset()?;
    sandbox.apply_config(rendered)?;
    sandbox.start(scenario)?;
    sandbox.start_recording(&scenario.name)?;

    let deadline = Instant::now() + config.deadline();
    loop {
        if !sandbox.is_alive()? {
            let recording = sandbox.stop_recording()?;
            info!(
                "{}: '{}' completed, recording at {}",
                sandbox.name(),
                scenario.name,
                recording.display()
            );
            return Ok(ReplayOutcome::Completed { recording });
        }
        if Instant::now() >= deadline {
            // Stop the recorder first so the partial capture is flushed,
            // then let the cleanup kill take the stack down.
            let recording = sandbox.stop_recording().ok();
            info!(
                "{}: '{}' timed out after {:?}, partial recording: {}",
                sandbox.name(),
                scenario.name,
                config.deadline(),
                recording.is_some()
            );
            return Ok(ReplayOutcome::TimedOut { recording });
        }
        thread::sleep(config.poll_interval);
    }
}
