//! Command-template sandbox backend.
//!
//! The campaign manifest supplies an argv template per sandbox verb; this
//! backend shells out to them.  That keeps the harness agnostic about what
//! actually hosts the stack — a compose file, a systemd unit, an ssh
//! wrapper — while still giving the binary a working pool out of the box.
//!
//! Conventions the templates must follow:
//! - every command exits 0 on success; `status` exits 0 while the stack
//!   is alive and non-zero once playback ended
//! - `start` receives the scenario's record path and map id as two extra
//!   arguments; `record_start` receives the recording label
//! - an empty template is a no-op (not every backend has a reset step)

use std::fs;
use std::path::PathBuf;
use std::process;

use log::debug;
use serde_json::Value;

use crate::sandbox::{Sandbox, SandboxError};
use crate::scenario::Scenario;

/// Per-sandbox backend description from the campaign manifest.
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    /// Name used in logs.
    pub name: String,
    /// Where `apply_config` writes the rendered configuration tree.
    pub config_path: PathBuf,
    /// Directory the recorder writes into; recordings appear as
    /// `<recording_dir>/<label>`.
    pub recording_dir: PathBuf,
    pub reset: Vec<String>,
    pub start: Vec<String>,
    pub status: Vec<String>,
    pub record_start: Vec<String>,
    pub record_stop: Vec<String>,
    pub kill: Vec<String>,
}

/// [`Sandbox`] implementation that drives a backend through the argv
/// templates of a [`SandboxSpec`].
#[derive(Debug)]
pub struct CommandSandbox {
    spec: SandboxSpec,
    recording_label: Option<String>,
}

impl CommandSandbox {
    pub fn new(spec: SandboxSpec) -> Self {
        Self {
            spec,
            recording_label: None,
        }
    }

    fn run(&self, verb: &str, argv: &[String], extra: &[&str]) -> Result<(), SandboxError> {
        let Some((program, args)) = argv.split_first() else {
            debug!("{}: no {verb} template, skipping", self.spec.name);
            return Ok(());
        };
        let status = process::Command::new(program)
            .args(args)
            .args(extra)
            .status()?;
        if !status.success() {
            return Err(SandboxError::Backend(format!(
                "{verb} command exited with {status}"
            )));
        }
        Ok(())
    }
}

impl Sandbox for CommandSandbox {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn reset(&mut self) -> Result<(), SandboxError> {
        self.recording_label = None;
        self.run("reset", &self.spec.reset, &[])
    }

    fn apply_config(&mut self, config: &Value) -> Result<(), SandboxError> {
        let text = serde_json::to_string_pretty(config)
            .map_err(|e| SandboxError::Backend(format!("config serialization: {e}")))?;
        fs::write(&self.spec.config_path, text)?;
        Ok(())
    }

    fn start(&mut self, scenario: &Scenario) -> Result<(), SandboxError> {
        let record = scenario.record_path.display().to_string();
        self.run("start", &self.spec.start, &[&record, &scenario.map_id])
    }

    fn is_alive(&mut self) -> Result<bool, SandboxError> {
        let Some((program, args)) = self.spec.status.split_first() else {
            // Without a status probe the stack is assumed done immediately.
            return Ok(false);
        };
        let status = process::Command::new(program).args(args).status()?;
        Ok(status.success())
    }

    fn start_recording(&mut self, label: &str) -> Result<(), SandboxError> {
        self.run("record_start", &self.spec.record_start, &[label])?;
        self.recording_label = Some(label.to_string());
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<PathBuf, SandboxError> {
        let label = self
            .recording_label
            .take()
            .ok_or_else(|| SandboxError::Backend("no recording in progress".to_string()))?;
        self.run("record_stop", &self.spec.record_stop, &[])?;
        Ok(self.spec.recording_dir.join(label))
    }

    fn kill(&mut self) -> Result<(), SandboxError> {
        self.run("kill", &self.spec.kill, &[])
    }
}
