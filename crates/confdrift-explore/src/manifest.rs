//! Campaign manifest: the environment description the binary loads.
//!
//! One JSON file names everything a campaign needs outside this process:
//! the stack's configuration tree, the lane map, the scenario roster and
//! the sandbox backends.  Relative paths inside the manifest resolve
//! against the manifest's own directory, so a campaign directory can be
//! checked out and run from anywhere.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use confdrift_replay::{CommandSandbox, Sandbox, SandboxSpec, Scenario, ScenarioSet};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest io: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest parse: {0}")]
    Json(#[from] serde_json::Error),
}

/// One scenario as written in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioEntry {
    pub id: u64,
    pub name: String,
    pub record_path: PathBuf,
    pub map_id: String,
}

/// One sandbox backend as written in the manifest.  The argv templates
/// follow the conventions documented on [`CommandSandbox`].
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxEntry {
    pub name: String,
    pub config_path: PathBuf,
    pub recording_dir: PathBuf,
    #[serde(default)]
    pub reset: Vec<String>,
    pub start: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub record_start: Vec<String>,
    #[serde(default)]
    pub record_stop: Vec<String>,
    #[serde(default)]
    pub kill: Vec<String>,
}

impl SandboxEntry {
    fn to_spec(&self) -> SandboxSpec {
        SandboxSpec {
            name: self.name.clone(),
            config_path: self.config_path.clone(),
            recording_dir: self.recording_dir.clone(),
            reset: self.reset.clone(),
            start: self.start.clone(),
            status: self.status.clone(),
            record_start: self.record_start.clone(),
            record_stop: self.record_stop.clone(),
            kill: self.kill.clone(),
        }
    }
}

/// The whole campaign environment.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignManifest {
    /// The stack's configuration tree with its default values.
    pub config_tree: PathBuf,
    /// Lane map file the oracles query.
    pub lane_map: PathBuf,
    /// Active scenario roster.
    pub scenarios: Vec<ScenarioEntry>,
    /// Replacements for scenarios whose baselines turn out untrustworthy.
    #[serde(default)]
    pub reserve: Vec<ScenarioEntry>,
    /// Sandbox pool, one backend per concurrent replay.
    pub sandboxes: Vec<SandboxEntry>,
}

impl CampaignManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path)?;
        let mut manifest: CampaignManifest = serde_json::from_str(&text)?;
        if let Some(base) = path.parent() {
            manifest.resolve_relative_to(base);
        }
        Ok(manifest)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        resolve(&mut self.config_tree, base);
        resolve(&mut self.lane_map, base);
        for scenario in self.scenarios.iter_mut().chain(self.reserve.iter_mut()) {
            resolve(&mut scenario.record_path, base);
        }
        for sandbox in &mut self.sandboxes {
            resolve(&mut sandbox.config_path, base);
            resolve(&mut sandbox.recording_dir, base);
        }
    }

    /// Build the scenario roster, none with a baseline yet.
    pub fn scenario_set(&self) -> ScenarioSet {
        let build = |entry: &ScenarioEntry| {
            Scenario::new(
                entry.id,
                entry.name.clone(),
                entry.record_path.clone(),
                entry.map_id.clone(),
            )
        };
        ScenarioSet::new(
            self.scenarios.iter().map(build).collect(),
            self.reserve.iter().map(build).collect(),
        )
    }

    /// Build the sandbox pool.
    pub fn sandbox_pool(&self) -> Vec<Box<dyn Sandbox>> {
        self.sandboxes
            .iter()
            .map(|entry| Box::new(CommandSandbox::new(entry.to_spec())) as Box<dyn Sandbox>)
            .collect()
    }
}

fn resolve(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r#"{
        "config_tree": "conf/tunables.json",
        "lane_map": "/maps/sunnyvale.json",
        "scenarios": [
            { "id": 1, "name": "record_001", "record_path": "records/record_001", "map_id": "sunnyvale_loop" },
            { "id": 2, "name": "record_002", "record_path": "records/record_002", "map_id": "sunnyvale_loop" }
        ],
        "reserve": [
            { "id": 9, "name": "record_009", "record_path": "records/record_009", "map_id": "sunnyvale_loop" }
        ],
        "sandboxes": [
            {
                "name": "sandbox-0",
                "config_path": "sandbox-0/conf.json",
                "recording_dir": "sandbox-0/records",
                "start": ["stackctl", "start"],
                "status": ["stackctl", "status"],
                "kill": ["stackctl", "kill"]
            }
        ]
    }"#;

    fn write_manifest(dir: &Path) -> PathBuf {
        let path = dir.join("campaign.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{MANIFEST}").unwrap();
        path
    }

    #[test]
    fn test_relative_paths_resolve_against_the_manifest_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = CampaignManifest::load(&write_manifest(dir.path())).unwrap();

        assert_eq!(manifest.config_tree, dir.path().join("conf/tunables.json"));
        // Absolute paths stay as written.
        assert_eq!(manifest.lane_map, PathBuf::from("/maps/sunnyvale.json"));
        assert_eq!(
            manifest.scenarios[0].record_path,
            dir.path().join("records/record_001")
        );
        assert_eq!(
            manifest.sandboxes[0].recording_dir,
            dir.path().join("sandbox-0/records")
        );
    }

    #[test]
    fn test_scenario_set_splits_active_and_reserve() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = CampaignManifest::load(&write_manifest(dir.path())).unwrap();

        let set = manifest.scenario_set();
        assert_eq!(set.len(), 2);
        assert_eq!(set.reserve_len(), 1);
        assert_eq!(set.active()[0].id, 1);
        assert!(!set.active()[0].has_baseline());
    }

    #[test]
    fn test_sandbox_pool_uses_the_manifest_names() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = CampaignManifest::load(&write_manifest(dir.path())).unwrap();

        let pool = manifest.sandbox_pool();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].name(), "sandbox-0");
    }

    #[test]
    fn test_missing_template_defaults_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = CampaignManifest::load(&write_manifest(dir.path())).unwrap();
        // No "reset" key in the manifest: an empty template, i.e. a no-op.
        assert!(manifest.sandboxes[0].reset.is_empty());
    }

    #[test]
    fn test_garbled_manifest_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campaign.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CampaignManifest::load(&path),
            Err(ManifestError::Json(_))
        ));
    }
}
