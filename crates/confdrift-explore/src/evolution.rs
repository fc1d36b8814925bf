//! Evolutionary strategy — NSGA-II style reproduction and survivor
//! selection over candidate configurations.

use confdrift_config::{ConfigModel, Configuration, RangeTable};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::frontier::{pareto_order, Fitness};
use crate::mutator::MutationEngine;
use crate::strategy::{single_mutation_batch, Individual, SearchStrategy};

/// Probability a child is bred by single-point crossover.
const CROSSOVER_RATE: f64 = 0.2;

/// Probability a non-crossover child is bred by mutation (the rest are
/// plain copies that re-enter evaluation unchanged).
const MUTATION_RATE: f64 = 0.8;

/// Population-based strategy: breeds each generation from the evaluated
/// survivors of the last one.
pub struct EvolutionaryStrategy {
    population_size: usize,
    rng: ChaCha8Rng,
}

impl EvolutionaryStrategy {
    pub fn new(population_size: usize, seed: u64) -> Self {
        Self {
            population_size,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for EvolutionaryStrategy {
    fn name(&self) -> &'static str {
        "evolutionary"
    }

    fn next_generation(
        &mut self,
        survivors: &[Individual],
        model: &ConfigModel,
        table: &mut RangeTable,
        engine: &mut MutationEngine,
    ) -> Vec<Individual> {
        let parents: Vec<&Individual> = survivors.iter().filter(|i| !i.quarantined).collect();
        if parents.is_empty() {
            // First generation, or everything breedable crashed out.
            return single_mutation_batch(&mut self.rng, self.population_size, model, table, engine);
        }

        let mut children = Vec::with_capacity(self.population_size);
        for _ in 0..self.population_size {
            let first = self.rng.gen_range(0..parents.len());
            let roll: f64 = self.rng.gen();

            if roll < CROSSOVER_RATE && parents.len() >= 2 && model.option_count() >= 2 {
                // Distinct second parent, uniform over the rest.
                let second = (first + self.rng.gen_range(1..parents.len())) % parents.len();
                let cut = self.rng.gen_range(1..model.option_count());
                children.push(Individual::new(Configuration::crossover(
                    &parents[first].config,
                    &parents[second].config,
                    cut,
                )));
            } else if self.rng.gen::<f64>() < MUTATION_RATE && model.option_count() > 0 {
                let option_id = self.rng.gen_range(0..model.option_count());
                let child = match model.option_at(option_id) {
                    Some(option) => {
                        engine.mutate_configuration(option, &parents[first].config, table)
                    }
                    None => parents[first].config.clone(),
                };
                children.push(Individual::new(child));
            } else {
                children.push(Individual::new(parents[first].config.clone()));
            }
        }
        children
    }
}

/// NSGA-II survivor selection: keep the `target` best individuals by
/// front rank, then by crowding distance within a front.
///
/// Quarantined individuals never survive; unevaluated ones rank with an
/// all-zero fitness.
pub fn select_survivors(population: Vec<Individual>, target: usize) -> Vec<Individual> {
    let mut population: Vec<Individual> =
        population.into_iter().filter(|i| !i.quarantined).collect();
    if population.len() <= target {
        return population;
    }

    let fitness: Vec<Fitness> = population
        .iter()
        .map(|i| i.fitness.unwrap_or_default())
        .collect();
    let order = pareto_order(&fitness);

    let mut slots: Vec<Option<Individual>> = population.drain(..).map(Some).collect();
    order
        .into_iter()
        .take(target)
        .filter_map(|i| slots[i].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> ConfigModel {
        ConfigModel::from_tree(json!({
            "accel": 1.0,
            "brake": 2.0,
            "gap": 3.0,
            "rate": 4.0
        }))
        .unwrap()
    }

    fn evaluated(config: Configuration, confirmed_novel: f64) -> Individual {
        Individual {
            config,
            fitness: Some(Fitness {
                confirmed_novel,
                distinct_kinds: confirmed_novel,
                branch_count: confirmed_novel,
                sinuosity: confirmed_novel,
            }),
            quarantined: false,
        }
    }

    #[test]
    fn test_bootstrap_when_no_parents_exist() {
        let m = model();
        let mut table = RangeTable::for_model(&m);
        let mut engine = MutationEngine::new(42);
        let mut strategy = EvolutionaryStrategy::new(6, 42);

        let generation = strategy.next_generation(&[], &m, &mut table, &mut engine);
        assert_eq!(generation.len(), 6);
        for individual in &generation {
            assert!(individual.config.touched_options().len() <= 1);
        }
    }

    #[test]
    fn test_children_come_from_the_parents() {
        let m = model();
        let mut table = RangeTable::for_model(&m);
        let mut engine = MutationEngine::new(42);
        let mut strategy = EvolutionaryStrategy::new(40, 42);

        let base = Configuration::defaults(&m);
        let parent_a = evaluated(base.with_value(0, "5.0".to_string(), "uniform-draw"), 2.0);
        let parent_b = evaluated(base.with_value(1, "7.0".to_string(), "uniform-draw"), 1.0);
        let survivors = vec![parent_a.clone(), parent_b.clone()];

        let children = strategy.next_generation(&survivors, &m, &mut table, &mut engine);
        assert_eq!(children.len(), 40);

        let copies = children
            .iter()
            .filter(|c| {
                c.config.values() == parent_a.config.values()
                    || c.config.values() == parent_b.config.values()
            })
            .count();
        let extended = children
            .iter()
            .filter(|c| c.config.lineage().len() > 1)
            .count();
        assert!(copies > 0, "copies and crossovers reproduce parent values");
        assert!(
            extended > 0,
            "mutation and mixing crossovers extend a parent's lineage"
        );
    }

    #[test]
    fn test_quarantined_parents_never_breed() {
        let m = model();
        let mut table = RangeTable::for_model(&m);
        let mut engine = MutationEngine::new(42);
        let mut strategy = EvolutionaryStrategy::new(60, 42);

        let base = Configuration::defaults(&m);
        // "99.0" is far outside every admissible range, so it can only
        // reach a child through this parent.
        let mut crasher = evaluated(base.with_value(0, "99.0".to_string(), "uniform-draw"), 9.0);
        crasher.quarantined = true;
        let healthy = evaluated(base.with_value(1, "7.0".to_string(), "uniform-draw"), 1.0);

        let children =
            strategy.next_generation(&[crasher, healthy], &m, &mut table, &mut engine);
        assert!(children
            .iter()
            .all(|c| c.config.value(0) != Some("99.0")));
    }

    #[test]
    fn test_survivors_are_the_dominant_individuals() {
        let m = model();
        let base = Configuration::defaults(&m);
        let population = vec![
            evaluated(base.clone(), 1.0),
            evaluated(base.clone(), 3.0),
            evaluated(base.clone(), 2.0),
        ];

        let survivors = select_survivors(population, 2);
        let scores: Vec<f64> = survivors
            .iter()
            .map(|i| i.fitness.unwrap().confirmed_novel)
            .collect();
        assert_eq!(scores, vec![3.0, 2.0]);
    }

    #[test]
    fn test_quarantined_individuals_never_survive() {
        let m = model();
        let base = Configuration::defaults(&m);
        let mut best = evaluated(base.clone(), 9.0);
        best.quarantined = true;
        let population = vec![best, evaluated(base.clone(), 1.0), evaluated(base, 2.0)];

        let survivors = select_survivors(population, 2);
        assert_eq!(survivors.len(), 2);
        assert!(survivors.iter().all(|i| !i.quarantined));
        assert!(survivors
            .iter()
            .all(|i| i.fitness.unwrap().confirmed_novel < 9.0));
    }

    #[test]
    fn test_unevaluated_individuals_rank_last() {
        let m = model();
        let base = Configuration::defaults(&m);
        let population = vec![
            Individual::new(base.clone()),
            evaluated(base.clone(), 1.0),
            evaluated(base, 2.0),
        ];

        let survivors = select_survivors(population, 2);
        assert!(survivors.iter().all(|i| i.fitness.is_some()));
    }
}
