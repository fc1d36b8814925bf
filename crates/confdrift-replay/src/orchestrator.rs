//! Batch orchestration across the sandbox pool.
//!
//! One batch replays the same candidate configuration over every active
//! scenario.  Scenarios are partitioned into chunks no larger than the
//! pool; within a chunk each scenario runs on its own sandbox from a
//! scoped worker thread, and the chunk joins before the next one starts,
//! so a sandbox is never shared between concurrent replays.

use std::thread;

use log::debug;
use serde_json::Value;
use thiserror::Error;

use confdrift_config::{ConfigError, ConfigModel, Configuration};

use crate::replay::{replay_one, ReplayConfig, ReplayOutcome};
use crate::sandbox::Sandbox;
use crate::scenario::Scenario;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("configuration render failed: {0}")]
    Render(#[from] ConfigError),
    #[error("sandbox pool is empty")]
    EmptyPool,
}

/// Outcome of one scenario within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReplay {
    pub scenario_id: u64,
    pub outcome: ReplayOutcome,
}

/// Renders candidate configurations and fans replays out over the pool.
pub struct ExecutionOrchestrator {
    model: ConfigModel,
    replay: ReplayConfig,
}

impl ExecutionOrchestrator {
    pub fn new(model: ConfigModel, replay: ReplayConfig) -> Self {
        Self { model, replay }
    }

    pub fn model(&self) -> &ConfigModel {
        &self.model
    }

    /// Render a candidate into the stack's full configuration tree.
    ///
    /// The result replaces the live tree wholesale when a sandbox applies
    /// it; untouched options are re-emitted at their candidate values, so
    /// no stale setting can survive from an earlier replay.
    pub fn materialize(&self, candidate: &Configuration) -> Result<Value, ReplayError> {
        Ok(self.model.render(candidate.values())?)
    }

    /// Replay every scenario under `candidate`, at most `pool.len()` at a
    /// time.  Results come back in scenario order regardless of how the
    /// chunks interleave.
    pub fn replay_batch(
        &self,
        candidate: &Configuration,
        scenarios: &[Scenario],
        pool: &mut [Box<dyn Sandbox>],
    ) -> Result<Vec<ScenarioReplay>, ReplayError> {
        if pool.is_empty() {
            return Err(ReplayError::EmptyPool);
        }
        let rendered = self.materialize(candidate)?;
        let rendered = &rendered;
        let replay = &self.replay;

        let mut results = Vec::with_capacity(scenarios.len());
        for chunk in scenarios.chunks(pool.len()) {
            debug!(
                "replaying chunk of {} scenario(s) on {} sandbox(es)",
                chunk.len(),
                pool.len()
            );
            let outcomes: Vec<ReplayOutcome> = thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .zip(pool.iter_mut())
                    .map(|(scenario, sandbox)| {
                        scope.spawn(move || replay_one(replay, sandbox.as_mut(), scenario, rendered))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| ReplayOutcome::Crashed {
                            reason: "replay worker panicked".to_string(),
                        })
                    })
                    .collect()
            });
            for (scenario, outcome) in chunk.iter().zip(outcomes) {
                results.push(ScenarioReplay {
                    scenario_id: scenario.id,
                    outcome,
                });
            }
        }
        Ok(results)
    }
}
