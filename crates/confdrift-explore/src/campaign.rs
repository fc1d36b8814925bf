//! The main campaign loop — search-based configuration fuzzing.

use crate::checkpoint::{
    save_snapshot, CampaignSnapshot, SerializableBaseline, SnapshotConfig, SnapshotError,
};
use crate::evolution::{select_survivors, EvolutionaryStrategy};
use crate::frontier::Fitness;
use crate::ledger::RunLedger;
use crate::mutator::MutationEngine;
use crate::novelty::{majority_kinds, NoveltyFilter, CONFIRM_MAJORITY, CONFIRM_RUNS};
use crate::strategy::{CombinatorialStrategy, Individual, RandomStrategy, SearchStrategy};
use confdrift_config::{ConfigError, ConfigModel, Configuration, RangeTable};
use confdrift_oracle::{
    GeometryService, OracleEngine, RecordingAnalysis, RecordingReader, Violation, ViolationKind,
};
use confdrift_replay::{
    ExecutionOrchestrator, ReplayConfig, ReplayError, ReplayOutcome, Sandbox, Scenario,
    ScenarioSet,
};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from the campaign engine.
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("configuration model error: {0}")]
    Config(#[from] ConfigError),

    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no scenario with an established baseline")]
    NoBaselineData,

    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),
}

/// Which search strategy drives the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Random,
    Combinatorial,
    Evolutionary,
}

impl StrategyKind {
    /// Parse the tag produced by [`fmt::Display`].
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "random" => Some(StrategyKind::Random),
            "combinatorial" => Some(StrategyKind::Combinatorial),
            "evolutionary" => Some(StrategyKind::Evolutionary),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            StrategyKind::Random => "random",
            StrategyKind::Combinatorial => "combinatorial",
            StrategyKind::Evolutionary => "evolutionary",
        };
        write!(f, "{tag}")
    }
}

/// Configuration for a fuzzing campaign.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Master seed.
    pub seed: u64,
    /// Candidates per generation, and the survivor target.
    pub population_size: usize,
    /// All-time generation limit, counted across resumes.
    pub max_generations: u64,
    /// Optional wall-clock budget for the whole run.
    pub time_budget: Option<Duration>,
    /// Which search strategy proposes candidates.
    pub strategy: StrategyKind,
    /// Subset size for the combinatorial strategy.
    pub combinatorial_strength: usize,
    /// Reruns per determinism confirmation.
    pub confirm_runs: usize,
    /// Reruns a violation kind must appear in to count as confirmed.
    pub confirm_majority: usize,
    /// Optional output directory for the ledger, range reports and
    /// snapshots.
    pub output_dir: Option<PathBuf>,
    /// Per-replay deadline settings.
    pub replay: ReplayConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            population_size: 8,
            max_generations: 100,
            time_budget: None,
            strategy: StrategyKind::Evolutionary,
            combinatorial_strength: 2,
            confirm_runs: CONFIRM_RUNS,
            confirm_majority: CONFIRM_MAJORITY,
            output_dir: None,
            replay: ReplayConfig::default(),
        }
    }
}

/// The campaign engine.
pub struct Campaign {
    config: CampaignConfig,
    orchestrator: ExecutionOrchestrator,
    scenarios: ScenarioSet,
    pool: Vec<Box<dyn Sandbox>>,
    reader: Box<dyn RecordingReader>,
    geometry: Arc<dyn GeometryService>,
    strategy: Box<dyn SearchStrategy>,
    filter: NoveltyFilter,
    table: RangeTable,
    engine: MutationEngine,
    population: Vec<Individual>,
    ledger: Option<RunLedger>,
    /// Stats tracking.
    generations_completed: u64,
    total_replays: u64,
    confirmed_total: usize,
    quarantined_total: usize,
    crashed_replays: u64,
    started: Instant,
}

/// What one candidate's evaluation contributed to the generation report.
#[derive(Debug, Default)]
struct EvalOutcome {
    had_data: bool,
    confirmed: usize,
}

fn build_strategy(config: &CampaignConfig, model: &ConfigModel) -> Box<dyn SearchStrategy> {
    match config.strategy {
        StrategyKind::Random => Box::new(RandomStrategy::new(config.population_size, config.seed)),
        StrategyKind::Combinatorial => Box::new(CombinatorialStrategy::new(
            model,
            config.combinatorial_strength,
            config.population_size,
            config.seed,
        )),
        StrategyKind::Evolutionary => Box::new(EvolutionaryStrategy::new(
            config.population_size,
            config.seed,
        )),
    }
}

impl Campaign {
    /// Create a new campaign over the given model, scenarios and sandboxes.
    pub fn new(
        config: CampaignConfig,
        model: ConfigModel,
        scenarios: ScenarioSet,
        pool: Vec<Box<dyn Sandbox>>,
        reader: Box<dyn RecordingReader>,
        geometry: Arc<dyn GeometryService>,
    ) -> Self {
        if pool.is_empty() {
            warn!("sandbox pool is empty — every replay batch will fail");
        }

        let strategy = build_strategy(&config, &model);
        let table = RangeTable::for_model(&model);
        let engine = MutationEngine::new(config.seed);
        let orchestrator = ExecutionOrchestrator::new(model, config.replay.clone());
        let ledger = match config.output_dir {
            Some(ref dir) => match RunLedger::new(dir) {
                Ok(ledger) => Some(ledger),
                Err(error) => {
                    warn!("failed to open run ledger in {}: {error}", dir.display());
                    None
                }
            },
            None => None,
        };

        Self {
            config,
            orchestrator,
            scenarios,
            pool,
            reader,
            geometry,
            strategy,
            filter: NoveltyFilter::default(),
            table,
            engine,
            population: Vec::new(),
            ledger,
            generations_completed: 0,
            total_replays: 0,
            confirmed_total: 0,
            quarantined_total: 0,
            crashed_replays: 0,
            started: Instant::now(),
        }
    }

    /// Run the full campaign.
    ///
    /// Establishes per-scenario baselines first, then runs generations
    /// until the budget, the generation limit or strategy exhaustion ends
    /// the search.  Returns the final report with all findings.
    pub fn run(&mut self) -> Result<CampaignReport, CampaignError> {
        info!(
            "Starting campaign: {} generations, population {}, {} scenarios, {} sandboxes, {} strategy",
            self.config.max_generations,
            self.config.population_size,
            self.scenarios.len(),
            self.pool.len(),
            self.strategy.name()
        );

        if self.scenarios.is_empty() {
            return Err(CampaignError::NoBaselineData);
        }

        info!("Establishing default-configuration baselines...");
        self.establish_baselines()?;

        while self.generations_completed < self.config.max_generations {
            info!(
                "=== Generation {}/{} ===",
                self.generations_completed + 1,
                self.config.max_generations
            );

            // The all-time generation count labels the banner, the ledger
            // rows and the range reports, so resumed runs continue the
            // numbering instead of restarting at zero.
            let report = self.run_generation(self.generations_completed)?;
            self.generations_completed += 1;

            info!(
                "Generation {}: {} candidates, {} with data, {} confirmed novel, {} quarantined, population: {}",
                self.generations_completed,
                report.candidates,
                report.evaluated,
                report.confirmed_novel,
                report.quarantined,
                self.population.len()
            );
            if report.candidates > 0 && report.evaluated == 0 {
                warn!(
                    "Generation {} produced no usable recordings at all",
                    self.generations_completed
                );
            }

            // Save a snapshot if an output directory is configured
            if let Some(ref output_dir) = self.config.output_dir {
                if let Err(error) = self.save_snapshot_to_dir(output_dir) {
                    warn!("Failed to save snapshot: {error}");
                }
            }

            // Check for stopping conditions
            if self.strategy.exhausted() {
                info!("Strategy exhausted its candidate space, stopping early");
                break;
            }
            if let Some(budget) = self.config.time_budget {
                if self.started.elapsed() >= budget {
                    info!("Wall-clock budget of {budget:?} exceeded, stopping");
                    break;
                }
            }
        }

        Ok(self.generate_report())
    }

    /// Execute one generation:
    /// 1. Ask the strategy for the next candidate batch
    /// 2. Replay every candidate over the active scenarios
    /// 3. Diff violations against the baselines, confirm the novel ones
    /// 4. Merge survivors into the population
    fn run_generation(&mut self, generation: u64) -> Result<GenerationReport, CampaignError> {
        let mut candidates = self.strategy.next_generation(
            &self.population,
            self.orchestrator.model(),
            &mut self.table,
            &mut self.engine,
        );
        debug!("proposed {} candidate configuration(s)", candidates.len());

        let mut report = GenerationReport {
            candidates: candidates.len(),
            evaluated: 0,
            confirmed_novel: 0,
            quarantined: 0,
        };

        for individual in &mut candidates {
            let outcome = self.evaluate(generation, individual)?;
            report.evaluated += usize::from(outcome.had_data);
            report.confirmed_novel += outcome.confirmed;
            report.quarantined += usize::from(individual.quarantined);
        }

        if let Some(ledger) = self.ledger.as_mut() {
            if let Err(error) =
                ledger.write_range_report(generation, self.orchestrator.model(), &self.table)
            {
                warn!("failed to write the range report: {error}");
            }
        }

        let merged: Vec<Individual> = self.population.drain(..).chain(candidates).collect();
        self.population = select_survivors(merged, self.config.population_size);

        Ok(report)
    }

    /// Replay one candidate over every active scenario and score it.
    fn evaluate(
        &mut self,
        generation: u64,
        individual: &mut Individual,
    ) -> Result<EvalOutcome, CampaignError> {
        let replays = self.orchestrator.replay_batch(
            &individual.config,
            self.scenarios.active(),
            &mut self.pool,
        )?;
        self.total_replays += replays.len() as u64;

        let mut outcome = EvalOutcome::default();
        let mut confirmed = 0usize;
        let mut kinds: BTreeSet<ViolationKind> = BTreeSet::new();
        let mut branch_total = 0usize;
        let mut sinuosity_sum = 0.0;
        let mut scored = 0usize;

        for replay in replays {
            if replay.outcome.is_crash() {
                self.crashed_replays += 1;
            }
            let Some(analysis) = self.analyze_outcome(&replay.outcome, replay.scenario_id) else {
                continue;
            };
            outcome.had_data = true;
            scored += 1;
            branch_total += analysis.branch_count;
            sinuosity_sum += analysis.sinuosity;
            kinds.extend(analysis.violations.iter().map(|v| v.kind));

            if analysis.stack_failed {
                info!(
                    "scenario {}: candidate broke the stack, quarantining",
                    replay.scenario_id
                );
                individual.quarantined = true;
            }

            let Some((record, novel)) = self.novel_violations(replay.scenario_id, &analysis)
            else {
                continue;
            };
            if novel.is_empty() {
                continue;
            }
            debug!(
                "scenario {}: {} novel candidate violation(s), confirming",
                replay.scenario_id,
                novel.len()
            );

            let confirmed_kinds = match self.confirm(replay.scenario_id, &individual.config) {
                Ok(kinds) => kinds,
                Err(CampaignError::NoBaselineData) => {
                    warn!(
                        "scenario {}: confirmation requested before a baseline exists",
                        replay.scenario_id
                    );
                    BTreeSet::new()
                }
                Err(error) => return Err(error),
            };

            for violation in novel.iter().filter(|v| confirmed_kinds.contains(&v.kind)) {
                confirmed += 1;
                self.confirmed_total += 1;
                info!(
                    "confirmed novel violation on scenario {}: {}",
                    replay.scenario_id, violation
                );
                self.record_confirmed(
                    generation,
                    &record,
                    replay.scenario_id,
                    violation,
                    &individual.config,
                );
            }
        }

        let sinuosity = if scored > 0 {
            sinuosity_sum / scored as f64
        } else {
            0.0
        };
        individual.fitness = Some(Fitness {
            confirmed_novel: confirmed as f64,
            distinct_kinds: kinds.len() as f64,
            branch_count: branch_total as f64,
            sinuosity,
        });
        if individual.quarantined {
            self.quarantined_total += 1;
        }
        outcome.confirmed = confirmed;
        Ok(outcome)
    }

    /// Replay the default configuration on every scenario that still needs
    /// a baseline.
    ///
    /// A scenario whose default replay fails at stack level (or yields no
    /// readable recording) is swapped for a reserve scenario, which then
    /// gets its own attempt.  Once the reserve is empty the failing
    /// baseline is accepted in place: the same failure will at least not
    /// be reported as novel later.
    fn establish_baselines(&mut self) -> Result<(), CampaignError> {
        let mut pending: Vec<u64> = self
            .scenarios
            .active()
            .iter()
            .filter(|s| !s.has_baseline())
            .map(|s| s.id)
            .collect();

        while !pending.is_empty() {
            let defaults = Configuration::defaults(self.orchestrator.model());
            let batch: Vec<Scenario> = self
                .scenarios
                .active()
                .iter()
                .filter(|s| pending.contains(&s.id))
                .cloned()
                .collect();
            let replays = self
                .orchestrator
                .replay_batch(&defaults, &batch, &mut self.pool)?;
            self.total_replays += replays.len() as u64;
            pending.clear();

            for replay in replays {
                let analysis = self.analyze_outcome(&replay.outcome, replay.scenario_id);
                match analysis {
                    Some(analysis) if !analysis.stack_failed => {
                        info!(
                            "scenario {}: baseline established with {} violation(s)",
                            replay.scenario_id,
                            analysis.violations.len()
                        );
                        self.set_scenario_baseline(replay.scenario_id, analysis.violations);
                    }
                    analysis => {
                        let promoted = self.scenarios.swap_out(replay.scenario_id).map(|p| p.id);
                        match promoted {
                            Some(promoted_id) => {
                                info!(
                                    "scenario {}: default replay is untrustworthy, swapped for reserve scenario {}",
                                    replay.scenario_id, promoted_id
                                );
                                pending.push(promoted_id);
                            }
                            None => match analysis {
                                Some(analysis) => {
                                    warn!(
                                        "scenario {}: keeping a stack-failed baseline, the reserve is empty",
                                        replay.scenario_id
                                    );
                                    self.set_scenario_baseline(
                                        replay.scenario_id,
                                        analysis.violations,
                                    );
                                }
                                None => {
                                    warn!(
                                        "scenario {}: no usable default recording and the reserve is empty, baseline is empty",
                                        replay.scenario_id
                                    );
                                    self.set_scenario_baseline(replay.scenario_id, Vec::new());
                                }
                            },
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Rerun one (scenario, candidate) pair and keep the violation kinds
    /// seen novel in a majority of the reruns.
    ///
    /// A rerun that fails at stack level contributes nothing, and because
    /// it also means the scenario's baseline was never trustworthy, the
    /// scenario is swapped for a reserve one afterwards.
    fn confirm(
        &mut self,
        scenario_id: u64,
        config: &Configuration,
    ) -> Result<BTreeSet<ViolationKind>, CampaignError> {
        let Some(scenario) = self
            .scenarios
            .active()
            .iter()
            .find(|s| s.id == scenario_id)
            .cloned()
        else {
            return Ok(BTreeSet::new());
        };
        if !scenario.has_baseline() {
            return Err(CampaignError::NoBaselineData);
        }

        let copies: Vec<Scenario> = std::iter::repeat_with(|| scenario.clone())
            .take(self.config.confirm_runs)
            .collect();
        let replays = self
            .orchestrator
            .replay_batch(config, &copies, &mut self.pool)?;
        self.total_replays += replays.len() as u64;

        let mut baseline_by_kind: BTreeMap<ViolationKind, Vec<Violation>> = BTreeMap::new();
        for violation in scenario.baseline() {
            baseline_by_kind
                .entry(violation.kind)
                .or_default()
                .push(violation.clone());
        }

        let mut rerun_kinds: Vec<BTreeSet<ViolationKind>> = Vec::with_capacity(replays.len());
        let mut stack_failed_rerun = false;
        for replay in replays {
            let mut kinds = BTreeSet::new();
            if let Some(analysis) = self.analyze_outcome(&replay.outcome, scenario_id) {
                if analysis.stack_failed {
                    stack_failed_rerun = true;
                } else {
                    for violation in &analysis.violations {
                        let baseline = baseline_by_kind
                            .get(&violation.kind)
                            .map(|b| b.as_slice())
                            .unwrap_or(&[]);
                        if self.filter.is_novel(violation, baseline) {
                            kinds.insert(violation.kind);
                        }
                    }
                }
            }
            rerun_kinds.push(kinds);
        }

        if stack_failed_rerun {
            warn!(
                "scenario {}: stack failure during confirmation, its baseline was never trustworthy",
                scenario_id
            );
            self.swap_baseline_scenario(scenario_id)?;
        }

        Ok(majority_kinds(&rerun_kinds, self.config.confirm_majority))
    }

    /// Swap an untrustworthy scenario for a reserve one and establish the
    /// replacement's baseline right away.
    fn swap_baseline_scenario(&mut self, scenario_id: u64) -> Result<(), CampaignError> {
        let promoted = self.scenarios.swap_out(scenario_id).map(|p| p.id);
        match promoted {
            Some(promoted_id) => {
                info!(
                    "swapped scenario {} out for reserve scenario {}",
                    scenario_id, promoted_id
                );
                self.establish_baselines()
            }
            None => {
                warn!(
                    "scenario {} kept despite an untrustworthy baseline, the reserve is empty",
                    scenario_id
                );
                Ok(())
            }
        }
    }

    /// Read and score one replay's recording.  `None` when the replay
    /// produced nothing readable.
    fn analyze_outcome(
        &self,
        outcome: &ReplayOutcome,
        scenario_id: u64,
    ) -> Option<RecordingAnalysis> {
        let recording = outcome.recording()?;
        match self.reader.read(recording) {
            Ok(events) => {
                Some(OracleEngine::standard(Arc::clone(&self.geometry)).analyze(events))
            }
            Err(error) => {
                warn!("unreadable recording for scenario {scenario_id}: {error}");
                None
            }
        }
    }

    /// Diff a replay's violations against the scenario's baseline.
    /// Returns the record name together with the novel subset; `None`
    /// when the scenario is no longer active.
    fn novel_violations(
        &self,
        scenario_id: u64,
        analysis: &RecordingAnalysis,
    ) -> Option<(String, Vec<Violation>)> {
        let scenario = self
            .scenarios
            .active()
            .iter()
            .find(|s| s.id == scenario_id)?;
        let mut baseline_by_kind: BTreeMap<ViolationKind, Vec<Violation>> = BTreeMap::new();
        for violation in scenario.baseline() {
            baseline_by_kind
                .entry(violation.kind)
                .or_default()
                .push(violation.clone());
        }
        let novel = analysis
            .violations
            .iter()
            .filter(|v| {
                let baseline = baseline_by_kind
                    .get(&v.kind)
                    .map(|b| b.as_slice())
                    .unwrap_or(&[]);
                self.filter.is_novel(v, baseline)
            })
            .cloned()
            .collect();
        Some((scenario.name.clone(), novel))
    }

    fn set_scenario_baseline(&mut self, scenario_id: u64, violations: Vec<Violation>) {
        if let Some(scenario) = self
            .scenarios
            .active_mut()
            .iter_mut()
            .find(|s| s.id == scenario_id)
        {
            scenario.set_baseline(violations);
        }
    }

    fn record_confirmed(
        &mut self,
        generation: u64,
        record: &str,
        scenario_id: u64,
        violation: &Violation,
        config: &Configuration,
    ) {
        let Some(ledger) = self.ledger.as_mut() else {
            return;
        };
        if let Err(error) = ledger.record_violation(
            generation,
            record,
            scenario_id,
            violation,
            &config.touched_options(),
        ) {
            warn!("failed to append to the violation ledger: {error}");
        }
    }

    /// Generate the final campaign report.
    fn generate_report(&self) -> CampaignReport {
        CampaignReport {
            generations: self.generations_completed,
            total_replays: self.total_replays,
            confirmed_novel: self.confirmed_total,
            quarantined: self.quarantined_total,
            crashed_replays: self.crashed_replays,
            population: self.population.clone(),
            strategy: self.strategy.name(),
            elapsed: self.started.elapsed(),
        }
    }

    /// Get current campaign stats.
    pub fn stats(&self) -> CampaignStats {
        CampaignStats {
            generations: self.generations_completed,
            replays: self.total_replays,
            confirmed_novel: self.confirmed_total,
            quarantined: self.quarantined_total,
            population_size: self.population.len(),
            scenarios: self.scenarios.len(),
            reserve: self.scenarios.reserve_len(),
        }
    }

    /// The scenario roster, with whatever baselines exist so far.
    pub fn scenarios(&self) -> &ScenarioSet {
        &self.scenarios
    }

    /// Save a snapshot to the given directory.
    pub fn save_snapshot_to_dir(&self, dir: &Path) -> Result<(), SnapshotError> {
        fs::create_dir_all(dir)?;
        let path = dir.join("snapshot.json");
        let snapshot = self.create_snapshot();
        save_snapshot(&path, &snapshot)?;
        info!("Snapshot saved to {}", path.display());
        Ok(())
    }

    /// Create a snapshot from the current state.
    fn create_snapshot(&self) -> CampaignSnapshot {
        let config = SnapshotConfig {
            seed: self.config.seed,
            population_size: self.config.population_size,
            max_generations: self.config.max_generations,
            strategy: self.config.strategy.to_string(),
            combinatorial_strength: self.config.combinatorial_strength,
            confirm_runs: self.config.confirm_runs,
            confirm_majority: self.config.confirm_majority,
        };

        let baselines = self
            .scenarios
            .active()
            .iter()
            .filter_map(SerializableBaseline::capture)
            .collect();
        let ranges = (0..self.table.len())
            .filter_map(|id| self.table.range(id))
            .map(Into::into)
            .collect();

        CampaignSnapshot {
            config,
            baselines,
            ranges,
            generations_completed: self.generations_completed,
            total_replays: self.total_replays,
            confirmed_total: self.confirmed_total,
            quarantined_total: self.quarantined_total,
            mutation_counter: self.engine.counter(),
        }
    }

    /// Create a campaign from a snapshot, optionally overriding the
    /// generation limit.
    ///
    /// Baselines, narrowed ranges and the mutation counter are restored;
    /// the population is re-bootstrapped by the strategy on the first
    /// resumed generation.
    #[allow(clippy::too_many_arguments)]
    pub fn from_snapshot(
        snapshot: CampaignSnapshot,
        model: ConfigModel,
        mut scenarios: ScenarioSet,
        pool: Vec<Box<dyn Sandbox>>,
        reader: Box<dyn RecordingReader>,
        geometry: Arc<dyn GeometryService>,
        max_generations_override: Option<u64>,
        output_dir: Option<PathBuf>,
    ) -> Result<Self, CampaignError> {
        let Some(strategy) = StrategyKind::parse(&snapshot.config.strategy) else {
            return Err(CampaignError::UnknownStrategy(
                snapshot.config.strategy.clone(),
            ));
        };
        let config = CampaignConfig {
            seed: snapshot.config.seed,
            population_size: snapshot.config.population_size,
            max_generations: max_generations_override.unwrap_or(snapshot.config.max_generations),
            time_budget: None,
            strategy,
            combinatorial_strength: snapshot.config.combinatorial_strength,
            confirm_runs: snapshot.config.confirm_runs,
            confirm_majority: snapshot.config.confirm_majority,
            output_dir,
            replay: ReplayConfig::default(),
        };

        for saved in &snapshot.baselines {
            let violations = saved.restore()?;
            match scenarios
                .active_mut()
                .iter_mut()
                .find(|s| s.id == saved.scenario_id)
            {
                Some(scenario) => scenario.set_baseline(violations),
                None => warn!(
                    "snapshot baseline for unknown scenario {} ({}) ignored",
                    saved.scenario_id, saved.scenario_name
                ),
            }
        }

        let mut campaign = Self::new(config, model, scenarios, pool, reader, geometry);
        for (id, range) in snapshot.ranges.iter().enumerate() {
            campaign.table.set_range(id, range.into());
        }
        campaign.engine =
            MutationEngine::resume(snapshot.config.seed, snapshot.mutation_counter);
        campaign.generations_completed = snapshot.generations_completed;
        campaign.total_replays = snapshot.total_replays;
        campaign.confirmed_total = snapshot.confirmed_total;
        campaign.quarantined_total = snapshot.quarantined_total;

        info!(
            "Restored snapshot: {} generations completed, {} replays, {} confirmed findings",
            snapshot.generations_completed, snapshot.total_replays, snapshot.confirmed_total
        );
        Ok(campaign)
    }
}

/// Result of a single generation.
#[derive(Debug)]
pub struct GenerationReport {
    pub candidates: usize,
    pub evaluated: usize,
    pub confirmed_novel: usize,
    pub quarantined: usize,
}

/// Final campaign report.
#[derive(Debug, Clone)]
pub struct CampaignReport {
    pub generations: u64,
    pub total_replays: u64,
    pub confirmed_novel: usize,
    pub quarantined: usize,
    pub crashed_replays: u64,
    pub population: Vec<Individual>,
    pub strategy: &'static str,
    pub elapsed: Duration,
}

/// Current campaign statistics.
#[derive(Debug, Clone)]
pub struct CampaignStats {
    pub generations: u64,
    pub replays: u64,
    pub confirmed_novel: usize,
    pub quarantined: usize,
    pub population_size: usize,
    pub scenarios: usize,
    pub reserve: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::load_snapshot;
    use confdrift_oracle::telemetry::{
        PlanningUpdate, Pose, RoutingUpdate, CHAN_PLANNING, CHAN_POSE, CHAN_PREDICTION,
        CHAN_ROUTING,
    };
    use confdrift_oracle::{
        Footprint, LaneId, Message, OracleError, Point2, TelemetryEvent,
    };
    use confdrift_replay::SandboxError;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One lane everywhere, 30 km/h, nothing near a boundary.
    struct FlatMap;

    impl GeometryService for FlatMap {
        fn lane_containing(&self, _point: Point2) -> Option<LaneId> {
            Some(LaneId("lane-30".to_string()))
        }

        fn speed_limit(&self, _lane: &LaneId) -> f64 {
            30.0
        }

        fn boundary_distance(&self, _footprint: &Footprint, _lane: &LaneId) -> f64 {
            f64::MAX
        }

        fn intersection_ids(&self) -> BTreeSet<LaneId> {
            BTreeSet::new()
        }
    }

    /// A healthy drive at the given speed; routing can be withheld to
    /// break the stack-failure oracle's expectations.
    fn stream(speed_mps: f64, routing: bool) -> Vec<TelemetryEvent> {
        let mut events = Vec::new();
        if routing {
            events.push(TelemetryEvent::new(
                CHAN_ROUTING,
                Message::Routing(RoutingUpdate { has_goal: true }),
                0,
            ));
        }
        for i in 0..5i64 {
            let x = i as f64 * 10.0;
            let t = i * 100_000_000;
            events.push(TelemetryEvent::new(
                CHAN_POSE,
                Message::Pose(Pose {
                    position: Point2::new(x, 0.0),
                    heading_rad: 0.0,
                    speed_mps,
                }),
                t,
            ));
            events.push(TelemetryEvent::new(CHAN_PREDICTION, Message::Prediction, t + 1));
            events.push(TelemetryEvent::new(
                CHAN_PLANNING,
                Message::Planning(PlanningUpdate {
                    decision: Some("CRUISE".to_string()),
                    points: vec![Point2::new(x, 0.0), Point2::new(x + 5.0, 0.0)],
                }),
                t + 2,
            ));
        }
        events
    }

    /// Sandbox whose recordings encode (scenario, was-the-config-default)
    /// so the fake reader can hand back a matching scripted stream.
    struct FakeSandbox {
        tag: &'static str,
        scenario: String,
        replays: Arc<AtomicUsize>,
    }

    impl Sandbox for FakeSandbox {
        fn name(&self) -> &str {
            "fake"
        }

        fn reset(&mut self) -> Result<(), SandboxError> {
            Ok(())
        }

        fn apply_config(&mut self, config: &Value) -> Result<(), SandboxError> {
            let replan = config.get("replan").and_then(Value::as_bool).unwrap_or(false);
            self.tag = if replan { "default" } else { "mutated" };
            Ok(())
        }

        fn start(&mut self, scenario: &Scenario) -> Result<(), SandboxError> {
            self.scenario = scenario.name.clone();
            self.replays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_alive(&mut self) -> Result<bool, SandboxError> {
            Ok(false)
        }

        fn start_recording(&mut self, _label: &str) -> Result<(), SandboxError> {
            Ok(())
        }

        fn stop_recording(&mut self) -> Result<PathBuf, SandboxError> {
            Ok(PathBuf::from(format!("/fake/{}-{}", self.scenario, self.tag)))
        }

        fn kill(&mut self) -> Result<(), SandboxError> {
            Ok(())
        }
    }

    struct FakeReader {
        streams: Vec<(String, Vec<TelemetryEvent>)>,
    }

    impl RecordingReader for FakeReader {
        fn read(&self, path: &Path) -> Result<Vec<TelemetryEvent>, OracleError> {
            let text = path.to_string_lossy();
            for (suffix, events) in &self.streams {
                if text.ends_with(suffix.as_str()) {
                    return Ok(events.clone());
                }
            }
            Err(OracleError::RecordingRead {
                path: text.to_string(),
                reason: "no scripted stream".to_string(),
            })
        }
    }

    fn model() -> ConfigModel {
        ConfigModel::from_tree(json!({ "replan": true })).unwrap()
    }

    fn scenario(id: u64, name: &str) -> Scenario {
        Scenario::new(id, name, PathBuf::from(format!("/records/{name}")), "borregas")
    }

    fn fast_config() -> CampaignConfig {
        CampaignConfig {
            seed: 7,
            population_size: 2,
            max_generations: 1,
            strategy: StrategyKind::Random,
            confirm_runs: 4,
            confirm_majority: 3,
            ..CampaignConfig::default()
        }
    }

    fn campaign_with(
        config: CampaignConfig,
        scenarios: ScenarioSet,
        streams: Vec<(String, Vec<TelemetryEvent>)>,
        replays: &Arc<AtomicUsize>,
    ) -> Campaign {
        let pool: Vec<Box<dyn Sandbox>> = (0..2)
            .map(|_| {
                Box::new(FakeSandbox {
                    tag: "default",
                    scenario: String::new(),
                    replays: Arc::clone(replays),
                }) as Box<dyn Sandbox>
            })
            .collect();
        Campaign::new(
            config,
            model(),
            scenarios,
            pool,
            Box::new(FakeReader { streams }),
            Arc::new(FlatMap),
        )
    }

    #[test]
    fn test_campaign_config_default() {
        let config = CampaignConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.population_size, 8);
        assert_eq!(config.strategy, StrategyKind::Evolutionary);
        assert_eq!(config.confirm_runs, 6);
        assert_eq!(config.confirm_majority, 4);
    }

    #[test]
    fn test_strategy_kind_tags_roundtrip() {
        for kind in [
            StrategyKind::Random,
            StrategyKind::Combinatorial,
            StrategyKind::Evolutionary,
        ] {
            assert_eq!(StrategyKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(StrategyKind::parse("annealing"), None);
    }

    #[test]
    fn test_campaign_initial_stats() {
        let replays = Arc::new(AtomicUsize::new(0));
        let campaign = campaign_with(
            fast_config(),
            ScenarioSet::new(vec![scenario(1, "rec-a")], vec![]),
            vec![],
            &replays,
        );
        let stats = campaign.stats();
        assert_eq!(stats.generations, 0);
        assert_eq!(stats.replays, 0);
        assert_eq!(stats.scenarios, 1);
        assert_eq!(stats.population_size, 0);
    }

    #[test]
    fn test_empty_scenario_set_is_rejected() {
        let replays = Arc::new(AtomicUsize::new(0));
        let mut campaign = campaign_with(fast_config(), ScenarioSet::default(), vec![], &replays);
        assert!(matches!(campaign.run(), Err(CampaignError::NoBaselineData)));
    }

    #[test]
    fn test_baselines_established_for_every_scenario() {
        let replays = Arc::new(AtomicUsize::new(0));
        let streams = vec![
            ("rec-a-default".to_string(), stream(5.0, true)),
            ("rec-b-default".to_string(), stream(5.0, true)),
        ];
        let mut config = fast_config();
        config.max_generations = 0;
        let mut campaign = campaign_with(
            config,
            ScenarioSet::new(vec![scenario(1, "rec-a"), scenario(2, "rec-b")], vec![]),
            streams,
            &replays,
        );

        let report = campaign.run().unwrap();
        assert_eq!(report.generations, 0);
        assert!(campaign.scenarios().active().iter().all(Scenario::has_baseline));
        // One default replay per scenario.
        assert_eq!(replays.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stack_failed_baseline_swaps_in_reserve() {
        let replays = Arc::new(AtomicUsize::new(0));
        let streams = vec![
            // No routing goal: the default replay itself is a stack failure.
            ("rec-bad-default".to_string(), stream(5.0, false)),
            ("rec-good-default".to_string(), stream(5.0, true)),
        ];
        let mut config = fast_config();
        config.max_generations = 0;
        let mut campaign = campaign_with(
            config,
            ScenarioSet::new(vec![scenario(1, "rec-bad")], vec![scenario(2, "rec-good")]),
            streams,
            &replays,
        );

        campaign.run().unwrap();
        let active = campaign.scenarios().active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 2);
        assert!(active[0].has_baseline());
        assert_eq!(campaign.stats().reserve, 0);
        // The failing scenario and its replacement each cost one replay.
        assert_eq!(replays.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reserve_exhausted_keeps_stack_failed_baseline() {
        let replays = Arc::new(AtomicUsize::new(0));
        let streams = vec![("rec-bad-default".to_string(), stream(5.0, false))];
        let mut config = fast_config();
        config.max_generations = 0;
        let mut campaign = campaign_with(
            config,
            ScenarioSet::new(vec![scenario(1, "rec-bad")], vec![]),
            streams,
            &replays,
        );

        campaign.run().unwrap();
        let active = campaign.scenarios().active();
        assert!(active[0].has_baseline());
        assert!(active[0]
            .baseline()
            .iter()
            .any(|v| v.kind == ViolationKind::StackFailure));
    }

    #[test]
    fn test_novel_speeding_violation_is_confirmed_and_ledgered() {
        let dir = tempfile::tempdir().unwrap();
        let replays = Arc::new(AtomicUsize::new(0));
        let streams = vec![
            ("rec-a-default".to_string(), stream(5.0, true)),
            // 20 m/s = 72 km/h in a 30 km/h lane.
            ("rec-a-mutated".to_string(), stream(20.0, true)),
        ];
        let mut config = fast_config();
        config.output_dir = Some(dir.path().to_path_buf());
        let mut campaign = campaign_with(
            config,
            ScenarioSet::new(vec![scenario(1, "rec-a")], vec![]),
            streams,
            &replays,
        );

        let report = campaign.run().unwrap();
        assert_eq!(report.generations, 1);
        assert_eq!(report.confirmed_novel, 2);
        assert_eq!(report.quarantined, 0);
        assert_eq!(report.population.len(), 2);
        // 1 baseline + 2 candidates × (1 evaluation + 4 confirmation reruns).
        assert_eq!(replays.load(Ordering::SeqCst), 11);

        let csv = fs::read_to_string(dir.path().join("violations.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("rec-a,SpeedingOracle,over@30,1,0,"));
        assert!(dir.path().join("ranges-gen-0000.txt").exists());
        assert!(dir.path().join("snapshot.json").exists());
    }

    #[test]
    fn test_stack_breaking_candidate_is_quarantined() {
        let replays = Arc::new(AtomicUsize::new(0));
        let streams = vec![
            ("rec-a-default".to_string(), stream(5.0, true)),
            // The candidate configuration kills routing entirely.
            ("rec-a-mutated".to_string(), stream(5.0, false)),
        ];
        let mut campaign = campaign_with(
            fast_config(),
            ScenarioSet::new(vec![scenario(1, "rec-a")], vec![]),
            streams,
            &replays,
        );

        let report = campaign.run().unwrap();
        assert_eq!(report.quarantined, 2);
        assert_eq!(report.confirmed_novel, 0);
        // Quarantined candidates never survive selection.
        assert!(report.population.is_empty());
        assert_eq!(campaign.stats().quarantined, 2);
    }

    #[test]
    fn test_snapshot_resume_skips_baseline_reestablishment() {
        let dir = tempfile::tempdir().unwrap();
        let replays = Arc::new(AtomicUsize::new(0));
        let streams = vec![
            ("rec-a-default".to_string(), stream(5.0, true)),
            ("rec-a-mutated".to_string(), stream(20.0, true)),
        ];
        let mut config = fast_config();
        config.output_dir = Some(dir.path().to_path_buf());
        let mut campaign = campaign_with(
            config,
            ScenarioSet::new(vec![scenario(1, "rec-a")], vec![]),
            streams.clone(),
            &replays,
        );
        campaign.run().unwrap();

        let snapshot = load_snapshot(dir.path().join("snapshot.json")).unwrap();
        assert_eq!(snapshot.generations_completed, 1);
        assert_eq!(snapshot.confirmed_total, 2);
        assert_eq!(snapshot.baselines.len(), 1);
        assert_eq!(snapshot.config.strategy, "random");

        let resumed_replays = Arc::new(AtomicUsize::new(0));
        let pool: Vec<Box<dyn Sandbox>> = (0..2)
            .map(|_| {
                Box::new(FakeSandbox {
                    tag: "default",
                    scenario: String::new(),
                    replays: Arc::clone(&resumed_replays),
                }) as Box<dyn Sandbox>
            })
            .collect();
        let mut resumed = Campaign::from_snapshot(
            snapshot,
            model(),
            ScenarioSet::new(vec![scenario(1, "rec-a")], vec![]),
            pool,
            Box::new(FakeReader { streams }),
            Arc::new(FlatMap),
            Some(0),
            None,
        )
        .unwrap();

        let report = resumed.run().unwrap();
        // Counters carried over; the baseline came from the snapshot, so
        // resuming replayed nothing at all.
        assert_eq!(report.generations, 1);
        assert_eq!(resumed.stats().confirmed_novel, 2);
        assert!(resumed.scenarios().active()[0].has_baseline());
        assert_eq!(resumed_replays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_strategy_in_snapshot_is_rejected() {
        let snapshot = CampaignSnapshot {
            config: SnapshotConfig {
                seed: 1,
                population_size: 2,
                max_generations: 5,
                strategy: "annealing".to_string(),
                combinatorial_strength: 2,
                confirm_runs: 6,
                confirm_majority: 4,
            },
            baselines: vec![],
            ranges: vec![],
            generations_completed: 0,
            total_replays: 0,
            confirmed_total: 0,
            quarantined_total: 0,
            mutation_counter: 0,
        };
        let result = Campaign::from_snapshot(
            snapshot,
            model(),
            ScenarioSet::default(),
            vec![],
            Box::new(FakeReader { streams: vec![] }),
            Arc::new(FlatMap),
            None,
            None,
        );
        assert!(matches!(result, Err(CampaignError::UnknownStrategy(_))));
    }
}
