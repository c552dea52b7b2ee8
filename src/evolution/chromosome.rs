//! Candidate solutions with lazily measured, memoized fitness.

use std::sync::{Arc, OnceLock};

use log::{debug, warn};

use crate::schema::{ObjectiveDirection, ParameterVector, RunConfig};

use super::evaluator::EvalHarness;
use super::operators::TunerRng;

/// Outcome of measuring a chromosome.
#[derive(Debug, Clone, PartialEq)]
pub enum Fitness {
    /// A finite score returned by the evaluator.
    Scored(f64),
    /// Worst possible fitness: the evaluator could not produce a score.
    Failed { reason: String },
}

impl Fitness {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Scored(score) => Some(*score),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Sort key where larger is better. Failures rank below every score.
    pub fn rank_key(&self, direction: ObjectiveDirection) -> f64 {
        match self {
            Self::Scored(score) => direction.rank_key(*score),
            Self::Failed { .. } => f64::NEG_INFINITY,
        }
    }

    /// Share of the roulette wheel: how far the rank key lies above
    /// `origin`. Never negative; failures weigh nothing.
    pub fn selection_weight(&self, direction: ObjectiveDirection, origin: f64) -> f64 {
        match self {
            Self::Scored(_) => (self.rank_key(direction) - origin).max(0.0),
            Self::Failed { .. } => 0.0,
        }
    }
}

/// Evaluation state of a chromosome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitnessState {
    Unevaluated,
    Evaluated(f64),
    Failed,
}

/// One candidate solution: a parameter vector plus its cached fitness.
#[derive(Debug, Clone)]
pub struct Chromosome {
    parameters: ParameterVector,
    run: Arc<RunConfig>,
    fitness: OnceLock<Fitness>,
}

impl Chromosome {
    /// Create an unevaluated chromosome.
    pub fn new(parameters: ParameterVector, run: Arc<RunConfig>) -> Self {
        Self {
            parameters,
            run,
            fitness: OnceLock::new(),
        }
    }

    /// Create a chromosome with a known fitness.
    pub fn with_fitness(parameters: ParameterVector, run: Arc<RunConfig>, fitness: Fitness) -> Self {
        Self {
            parameters,
            run,
            fitness: OnceLock::from(fitness),
        }
    }

    pub fn parameters(&self) -> &ParameterVector {
        &self.parameters
    }

    /// Shared run configuration.
    pub fn run_config(&self) -> &Arc<RunConfig> {
        &self.run
    }

    /// Cached fitness without evaluating.
    pub fn fitness(&self) -> Option<&Fitness> {
        self.fitness.get()
    }

    pub fn state(&self) -> FitnessState {
        match self.fitness.get() {
            None => FitnessState::Unevaluated,
            Some(Fitness::Scored(score)) => FitnessState::Evaluated(*score),
            Some(Fitness::Failed { .. }) => FitnessState::Failed,
        }
    }

    /// Fitness, measuring on first use.
    ///
    /// The evaluator runs at most once per chromosome, even when several
    /// threads ask concurrently. Failures are recorded as [`Fitness::Failed`]
    /// and never returned as errors.
    pub fn score(&self, harness: &EvalHarness) -> &Fitness {
        self.fitness
            .get_or_init(|| match harness.measure(&self.parameters, &self.run) {
                Ok(measurement) => {
                    debug!(
                        "Scored {:.4} {} for {}",
                        measurement.score, measurement.unit, self.parameters
                    );
                    Fitness::Scored(measurement.score)
                }
                Err(err) => {
                    warn!("Evaluation failed for {}: {}", self.parameters, err);
                    Fitness::Failed {
                        reason: err.to_string(),
                    }
                }
            })
    }

    /// Sort key of the cached fitness. Unevaluated chromosomes rank last.
    pub fn rank_key(&self, direction: ObjectiveDirection) -> f64 {
        self.fitness
            .get()
            .map_or(f64::NEG_INFINITY, |f| f.rank_key(direction))
    }

    /// Roulette weight of the cached fitness relative to `origin`.
    pub fn selection_weight(&self, direction: ObjectiveDirection, origin: f64) -> f64 {
        self.fitness
            .get()
            .map_or(0.0, |f| f.selection_weight(direction, origin))
    }

    /// New unevaluated child taking each gene from `self` with `probability`,
    /// otherwise from `other`.
    pub fn crossover(&self, other: &Chromosome, probability: f64, rng: &mut TunerRng) -> Chromosome {
        let parameters = rng.crossover(&self.parameters, &other.parameters, probability);
        Chromosome::new(parameters, Arc::clone(&self.run))
    }

    /// New unevaluated chromosome with each gene rescaled with `probability`.
    pub fn mutate(&self, probability: f64, rng: &mut TunerRng) -> Chromosome {
        let parameters = rng.mutate(&self.parameters, probability);
        Chromosome::new(parameters, Arc::clone(&self.run))
    }
}
