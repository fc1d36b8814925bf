//! CLI binary for the ConfDrift campaign engine.
//!
//! Runs search-based configuration-fuzzing campaigns against a recorded
//! scenario suite to surface configuration-sensitive rule violations in
//! the driving stack.
//!
//! # Usage
//!
//! ```bash
//! # Run a campaign
//! confdrift-explore run --manifest campaign.json
//!
//! # Run with custom parameters
//! confdrift-explore run --manifest campaign.json --population 16 --generations 200
//!
//! # Save results to a directory (enables snapshots)
//! confdrift-explore run --manifest campaign.json --output results/
//!
//! # Resume a previous campaign
//! confdrift-explore resume --output results/ --manifest campaign.json
//!
//! # Resume with a higher generation limit
//! confdrift-explore resume --output results/ --manifest campaign.json --generations 500
//! ```
//!
//! # Snapshots
//!
//! When an `--output` directory is given, the campaign saves a snapshot
//! after each generation to `{output}/snapshot.json`, alongside the
//! violation ledger and the per-generation range reports.
//!
//! The snapshot contains:
//! - Configuration (seed, population, strategy, ...)
//! - Per-scenario baselines
//! - Narrowed option ranges
//! - Progress counters (generations, replays, findings)
//!
//! Note: the population is NOT saved, survivors are cheap to re-derive.
//! On resume the strategy re-bootstraps while the baselines and narrowed
//! ranges carry forward, so confirmed findings stay comparable.

use clap::{Parser, Subcommand};
use confdrift_config::ConfigModel;
use confdrift_explore::campaign::{Campaign, CampaignConfig, StrategyKind};
use confdrift_explore::checkpoint::load_snapshot;
use confdrift_explore::lane_map::LaneMap;
use confdrift_explore::manifest::CampaignManifest;
use confdrift_explore::report::format_campaign_report;
use confdrift_replay::{JsonlRecordingReader, ReplayConfig, Sandbox, ScenarioSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "confdrift-explore")]
#[command(about = "Search-based configuration fuzzing for the driving stack")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fuzzing campaign.
    Run {
        /// Path to the campaign manifest (scenarios, sandboxes, map).
        #[arg(short, long)]
        manifest: String,

        /// Random seed for reproducibility.
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Candidates per generation and survivor target.
        #[arg(short, long, default_value = "8")]
        population: usize,

        /// Total generations.
        #[arg(short, long, default_value = "100")]
        generations: u64,

        /// Search strategy: "random", "combinatorial" or "evolutionary".
        #[arg(long, default_value = "evolutionary")]
        strategy: String,

        /// Subset size for the combinatorial strategy.
        #[arg(long, default_value = "2")]
        strength: usize,

        /// Reruns per determinism confirmation.
        #[arg(long, default_value = "6")]
        confirm_runs: usize,

        /// Reruns a violation kind must appear in to count as confirmed.
        #[arg(long, default_value = "4")]
        confirm_majority: usize,

        /// Wall-clock budget in seconds (unlimited when omitted).
        #[arg(long)]
        time_budget: Option<u64>,

        /// Per-replay playback allowance, seconds.
        #[arg(long, default_value = "120")]
        record_time: u64,

        /// Extra allowance for stack startup, seconds.
        #[arg(long, default_value = "30")]
        grace: u64,

        /// Liveness poll interval, milliseconds.
        #[arg(long, default_value = "500")]
        poll_interval: u64,

        /// Output directory for the ledger, reports and snapshots.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Resume from a saved snapshot.
    Resume {
        /// Directory containing snapshot.json; snapshots keep saving there.
        #[arg(short, long)]
        output: String,

        /// Path to the campaign manifest (the environment is not part of
        /// the snapshot).
        #[arg(short, long)]
        manifest: String,

        /// Override the generation limit (continue for more generations).
        #[arg(short, long)]
        generations: Option<u64>,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            manifest,
            seed,
            population,
            generations,
            strategy,
            strength,
            confirm_runs,
            confirm_majority,
            time_budget,
            record_time,
            grace,
            poll_interval,
            output,
        } => cmd_run(
            manifest,
            seed,
            population,
            generations,
            strategy,
            strength,
            confirm_runs,
            confirm_majority,
            time_budget,
            record_time,
            grace,
            poll_interval,
            output,
        ),
        Commands::Resume {
            output,
            manifest,
            generations,
        } => cmd_resume(output, manifest, generations),
    }
}

/// Everything the manifest describes, loaded and validated.
struct Environment {
    model: ConfigModel,
    scenarios: ScenarioSet,
    pool: Vec<Box<dyn Sandbox>>,
    lane_map: LaneMap,
}

fn load_environment(manifest_path: &str) -> Environment {
    if !Path::new(manifest_path).exists() {
        eprintln!("Error: manifest file not found: {}", manifest_path);
        std::process::exit(1);
    }

    let manifest = match CampaignManifest::load(Path::new(manifest_path)) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("Error: failed to load manifest: {}", e);
            std::process::exit(1);
        }
    };

    if manifest.scenarios.is_empty() {
        eprintln!("Error: manifest lists no scenarios");
        std::process::exit(1);
    }
    if manifest.sandboxes.is_empty() {
        eprintln!("Error: manifest lists no sandboxes");
        std::process::exit(1);
    }

    let model = match ConfigModel::from_file(&manifest.config_tree) {
        Ok(model) => model,
        Err(e) => {
            eprintln!(
                "Error: failed to load configuration tree {}: {}",
                manifest.config_tree.display(),
                e
            );
            std::process::exit(1);
        }
    };

    let lane_map = match LaneMap::from_file(&manifest.lane_map) {
        Ok(map) => map,
        Err(e) => {
            eprintln!(
                "Error: failed to load lane map {}: {}",
                manifest.lane_map.display(),
                e
            );
            std::process::exit(1);
        }
    };

    Environment {
        model,
        scenarios: manifest.scenario_set(),
        pool: manifest.sandbox_pool(),
        lane_map,
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    manifest: String,
    seed: u64,
    population: usize,
    generations: u64,
    strategy: String,
    strength: usize,
    confirm_runs: usize,
    confirm_majority: usize,
    time_budget: Option<u64>,
    record_time: u64,
    grace: u64,
    poll_interval: u64,
    output: Option<String>,
) {
    // Parse the strategy before touching the environment
    let strategy_kind = match StrategyKind::parse(&strategy) {
        Some(kind) => kind,
        None => {
            eprintln!(
                "Error: unknown strategy '{}'. Use 'random', 'combinatorial' or 'evolutionary'.",
                strategy
            );
            std::process::exit(1);
        }
    };

    if confirm_majority == 0 || confirm_majority > confirm_runs {
        eprintln!(
            "Error: confirmation majority must be between 1 and {} (the rerun count)",
            confirm_runs
        );
        std::process::exit(1);
    }

    let environment = load_environment(&manifest);

    // Create output directory if specified
    if let Some(ref output_dir) = output {
        if let Err(e) = fs::create_dir_all(output_dir) {
            eprintln!("Error: failed to create output directory: {}", e);
            std::process::exit(1);
        }
    }

    let config = CampaignConfig {
        seed,
        population_size: population,
        max_generations: generations,
        time_budget: time_budget.map(Duration::from_secs),
        strategy: strategy_kind,
        combinatorial_strength: strength,
        confirm_runs,
        confirm_majority,
        output_dir: output.clone().map(PathBuf::from),
        replay: ReplayConfig {
            max_record_time: Duration::from_secs(record_time),
            startup_grace: Duration::from_secs(grace),
            poll_interval: Duration::from_millis(poll_interval),
        },
    };

    eprintln!("═══════════════════════════════════════════════════════════════════════");
    eprintln!("  ConfDrift Campaign");
    eprintln!("═══════════════════════════════════════════════════════════════════════");
    eprintln!();
    eprintln!("Configuration:");
    eprintln!("  Manifest:        {}", manifest);
    eprintln!("  Tunable options: {}", environment.model.option_count());
    eprintln!("  Lanes:           {}", environment.lane_map.len());
    eprintln!(
        "  Scenarios:       {} (+{} reserve)",
        environment.scenarios.len(),
        environment.scenarios.reserve_len()
    );
    eprintln!("  Sandboxes:       {}", environment.pool.len());
    eprintln!("  Seed:            {}", seed);
    eprintln!("  Generations:     {}", generations);
    eprintln!("  Population:      {}", population);
    eprintln!("  Strategy:        {}", strategy_kind);
    eprintln!(
        "  Confirmation:    {} of {} reruns",
        confirm_majority, confirm_runs
    );
    eprintln!("  Record time:     {}s (+{}s grace)", record_time, grace);
    if let Some(budget) = time_budget {
        eprintln!("  Time budget:     {}s", budget);
    }
    if let Some(ref output_dir) = output {
        eprintln!("  Output:          {}", output_dir);
    }
    eprintln!();
    eprintln!("Starting campaign...");
    eprintln!();

    let mut campaign = Campaign::new(
        config,
        environment.model,
        environment.scenarios,
        environment.pool,
        Box::new(JsonlRecordingReader::new()),
        Arc::new(environment.lane_map),
    );

    let report = match campaign.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!();
            eprintln!("Campaign failed: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!();
    eprintln!("Campaign complete!");
    eprintln!();

    // Format and print report
    let formatted = format_campaign_report(&report);
    println!("{}", formatted);

    // Save output if requested
    if let Some(output_dir) = output {
        let report_path = format!("{}/report.txt", output_dir);
        if let Err(e) = fs::write(&report_path, &formatted) {
            eprintln!("Warning: failed to save report: {}", e);
        } else {
            eprintln!("Saved report to: {}", report_path);
        }
    }

    // Exit with error code if confirmed findings exist
    if report.confirmed_novel > 0 {
        std::process::exit(1);
    }
}

fn cmd_resume(output: String, manifest: String, generations_override: Option<u64>) {
    // Validate output directory exists
    if !Path::new(&output).is_dir() {
        eprintln!("Error: output directory not found: {}", output);
        std::process::exit(1);
    }

    // Load snapshot
    let snapshot_path = format!("{}/snapshot.json", output);
    if !Path::new(&snapshot_path).exists() {
        eprintln!("Error: snapshot file not found: {}", snapshot_path);
        std::process::exit(1);
    }

    let snapshot = match load_snapshot(&snapshot_path) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error: failed to load snapshot: {}", e);
            std::process::exit(1);
        }
    };

    // Calculate remaining generations
    let max_generations = generations_override.unwrap_or(snapshot.config.max_generations);
    let remaining = max_generations.saturating_sub(snapshot.generations_completed);

    if remaining == 0 {
        eprintln!(
            "Error: snapshot already completed {} generations (max: {})",
            snapshot.generations_completed, max_generations
        );
        eprintln!("Use --generations to raise the limit");
        std::process::exit(1);
    }

    let environment = load_environment(&manifest);

    eprintln!("═══════════════════════════════════════════════════════════════════════");
    eprintln!("  ConfDrift Campaign (RESUME)");
    eprintln!("═══════════════════════════════════════════════════════════════════════");
    eprintln!();
    eprintln!("Snapshot loaded from: {}", snapshot_path);
    eprintln!();
    eprintln!("Previous progress:");
    eprintln!(
        "  Generations completed: {}",
        snapshot.generations_completed
    );
    eprintln!("  Replays run:           {}", snapshot.total_replays);
    eprintln!("  Confirmed findings:    {}", snapshot.confirmed_total);
    eprintln!("  Quarantined:           {}", snapshot.quarantined_total);
    eprintln!("  Saved baselines:       {}", snapshot.baselines.len());
    eprintln!();
    eprintln!("Configuration:");
    eprintln!("  Manifest:              {}", manifest);
    eprintln!("  Seed:                  {}", snapshot.config.seed);
    eprintln!("  Strategy:              {}", snapshot.config.strategy);
    eprintln!("  Max generations:       {}", max_generations);
    eprintln!("  Remaining:             {}", remaining);
    eprintln!("  Output:                {}", output);
    eprintln!();
    eprintln!("Resuming campaign...");
    eprintln!();

    let mut campaign = match Campaign::from_snapshot(
        snapshot,
        environment.model,
        environment.scenarios,
        environment.pool,
        Box::new(JsonlRecordingReader::new()),
        Arc::new(environment.lane_map),
        Some(max_generations),
        Some(PathBuf::from(&output)),
    ) {
        Ok(campaign) => campaign,
        Err(e) => {
            eprintln!("Error: failed to restore campaign: {}", e);
            std::process::exit(1);
        }
    };

    let report = match campaign.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!();
            eprintln!("Campaign failed: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!();
    eprintln!("Campaign complete!");
    eprintln!();

    // Format and print report
    let formatted = format_campaign_report(&report);
    println!("{}", formatted);

    // Save report next to the snapshot
    let report_path = format!("{}/report.txt", output);
    if let Err(e) = fs::write(&report_path, &formatted) {
        eprintln!("Warning: failed to save report: {}", e);
    } else {
        eprintln!("Saved report to: {}", report_path);
    }

    // Exit with error code if confirmed findings exist
    if report.confirmed_novel > 0 {
        std::process::exit(1);
    }
}
