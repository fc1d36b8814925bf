//! Search strategies — how the next generation of candidates is proposed.

use confdrift_config::{ConfigModel, Configuration, RangeTable};
use itertools::Itertools;
use log::info;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::frontier::Fitness;
use crate::mutator::MutationEngine;

/// One candidate configuration in a generation.
#[derive(Debug, Clone)]
pub struct Individual {
    /// The candidate value vector.
    pub config: Configuration,
    /// Fitness once evaluated, `None` before.
    pub fitness: Option<Fitness>,
    /// Set when the candidate broke the stack outright on some scenario;
    /// the candidate keeps its report entry but never breeds.
    pub quarantined: bool,
}

impl Individual {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            fitness: None,
            quarantined: false,
        }
    }
}

/// A generation-to-generation candidate proposer.
///
/// Strategies share the mutation engine and the range table, so every
/// proposal draws from the same narrowing exploration memory no matter
/// which strategy is active.
pub trait SearchStrategy {
    /// Tag used in logs and reports.
    fn name(&self) -> &'static str;

    /// Propose the next generation from the evaluated survivors.
    fn next_generation(
        &mut self,
        survivors: &[Individual],
        model: &ConfigModel,
        table: &mut RangeTable,
        engine: &mut MutationEngine,
    ) -> Vec<Individual>;

    /// Whether the strategy has no candidates left to propose.
    fn exhausted(&self) -> bool {
        false
    }
}

/// Propose `count` individuals, each the default configuration with one
/// uniformly-chosen option mutated.
pub(crate) fn single_mutation_batch(
    rng: &mut ChaCha8Rng,
    count: usize,
    model: &ConfigModel,
    table: &mut RangeTable,
    engine: &mut MutationEngine,
) -> Vec<Individual> {
    let defaults = Configuration::defaults(model);
    let mut batch = Vec::with_capacity(count);
    if model.option_count() == 0 {
        return batch;
    }
    for _ in 0..count {
        let option_id = rng.gen_range(0..model.option_count());
        if let Some(option) = model.option_at(option_id) {
            batch.push(Individual::new(engine.mutate_configuration(
                option, &defaults, table,
            )));
        }
    }
    batch
}

/// Baseline strategy: every generation is independent single-option
/// perturbations of the defaults.
pub struct RandomStrategy {
    population_size: usize,
    rng: ChaCha8Rng,
}

impl RandomStrategy {
    pub fn new(population_size: usize, seed: u64) -> Self {
        Self {
            population_size,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next_generation(
        &mut self,
        _survivors: &[Individual],
        model: &ConfigModel,
        table: &mut RangeTable,
        engine: &mut MutationEngine,
    ) -> Vec<Individual> {
        single_mutation_batch(&mut self.rng, self.population_size, model, table, engine)
    }
}

/// t-way strategy: enumerate every option subset of the configured
/// strength once, in a seeded shuffle order, mutating exactly that subset
/// per candidate.  Runs dry when the enumeration is consumed.
pub struct CombinatorialStrategy {
    population_size: usize,
    subsets: Vec<Vec<usize>>,
    cursor: usize,
}

impl CombinatorialStrategy {
    pub fn new(model: &ConfigModel, strength: usize, population_size: usize, seed: u64) -> Self {
        let mut subsets: Vec<Vec<usize>> =
            (0..model.option_count()).combinations(strength).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        subsets.shuffle(&mut rng);
        info!(
            "combinatorial: {} subsets of strength {}",
            subsets.len(),
            strength
        );
        Self {
            population_size,
            subsets,
            cursor: 0,
        }
    }
}

impl SearchStrategy for CombinatorialStrategy {
    fn name(&self) -> &'static str {
        "combinatorial"
    }

    fn next_generation(
        &mut self,
        _survivors: &[Individual],
        model: &ConfigModel,
        table: &mut RangeTable,
        engine: &mut MutationEngine,
    ) -> Vec<Individual> {
        let defaults = Configuration::defaults(model);
        let mut batch = Vec::new();
        while batch.len() < self.population_size && self.cursor < self.subsets.len() {
            let subset = &self.subsets[self.cursor];
            self.cursor += 1;

            let mut config = defaults.clone();
            for &option_id in subset {
                if let Some(option) = model.option_at(option_id) {
                    config = engine.mutate_configuration(option, &config, table);
                }
            }
            batch.push(Individual::new(config));
        }
        batch
    }

    fn exhausted(&self) -> bool {
        self.cursor >= self.subsets.len()
    }
}
