//! Search-based configuration fuzzing for the driving stack.
//!
//! This crate implements the campaign loop that turns a suite of recorded
//! drives into a configuration-robustness test:
//!
//! 1. **Baseline** every scenario under the default configuration
//! 2. **Mutate** tunable options inside type-aware value ranges
//! 3. **Score** candidates by the novel, reproducible violations they cause
//!
//! # Architecture
//!
//! ```text
//! 1. Replay defaults on every scenario → per-scenario BASELINE
//! 2. Strategy proposes a population of candidate configurations
//! 3. Replay each candidate on every scenario, run the oracle bank
//! 4. Diff violations against the baseline → novel candidates
//! 5. Rerun each (scenario, candidate) pair → keep majority-confirmed kinds
//! 6. Quarantine candidates that break the stack outright
//! 7. Select survivors on the Pareto frontier → next generation
//! 8. Repeat until the generation or wall-clock budget is exhausted
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use confdrift_config::ConfigModel;
//! use confdrift_explore::campaign::{Campaign, CampaignConfig};
//! use confdrift_explore::lane_map::LaneMap;
//! use confdrift_explore::manifest::CampaignManifest;
//! use confdrift_explore::report::format_campaign_report;
//! use confdrift_replay::JsonlRecordingReader;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let manifest = CampaignManifest::load(Path::new("campaign.json")).unwrap();
//! let model = ConfigModel::from_file(&manifest.config_tree).unwrap();
//! let lane_map = LaneMap::from_file(&manifest.lane_map).unwrap();
//!
//! let mut campaign = Campaign::new(
//!     CampaignConfig::default(),
//!     model,
//!     manifest.scenario_set(),
//!     manifest.sandbox_pool(),
//!     Box::new(JsonlRecordingReader::new()),
//!     Arc::new(lane_map),
//! );
//! let report = campaign.run().unwrap();
//!
//! println!("{}", format_campaign_report(&report));
//! ```
//!
//! # Module Structure
//!
//! - [`mutator`] — Type-aware option mutation
//! - [`strategy`] — Candidate proposal strategies
//! - [`evolution`] — Evolutionary strategy and survivor selection
//! - [`frontier`] — Multi-objective fitness and Pareto ranking
//! - [`novelty`] — Baseline diffing and determinism confirmation
//! - [`campaign`] — The main campaign loop
//! - [`checkpoint`] — Snapshot save/restore
//! - [`ledger`] — On-disk violation ledger and range reports
//! - [`lane_map`] — JSON-backed map geometry
//! - [`manifest`] — Campaign environment description
//! - [`report`] — Campaign session reports
//!
//! # Determinism
//!
//! A campaign is deterministic given the same seed and scenario suite: the
//! mutation engine derives one child RNG per draw from a counter, and the
//! search layer uses BTreeMap/BTreeSet throughout instead of HashMaps.

pub mod campaign;
pub mod checkpoint;
pub mod evolution;
pub mod frontier;
pub mod lane_map;
pub mod ledger;
pub mod manifest;
pub mod mutator;
pub mod novelty;
pub mod report;
pub mod strategy;

// Re-export main types for convenience
pub use campaign::{
    Campaign, CampaignConfig, CampaignError, CampaignReport, CampaignStats, GenerationReport,
    StrategyKind,
};
pub use checkpoint::{load_snapshot, save_snapshot, CampaignSnapshot, SnapshotError};
pub use evolution::EvolutionaryStrategy;
pub use frontier::Fitness;
pub use lane_map::{LaneMap, LaneMapError};
pub use ledger::RunLedger;
pub use manifest::{CampaignManifest, ManifestError};
pub use mutator::MutationEngine;
pub use novelty::NoveltyFilter;
pub use strategy::{CombinatorialStrategy, Individual, RandomStrategy, SearchStrategy};
