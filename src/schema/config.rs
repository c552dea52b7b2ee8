//! Configuration types for tuning runs.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::GeneSet;
use crate::error::TunerResult;

/// Top-level configuration for an evolutionary tuning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Number of chromosomes per generation.
    #[serde(default = "default_population")]
    pub population: usize,
    /// Number of generations to run.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Best chromosomes carried unchanged into the next generation.
    #[serde(default = "default_elite")]
    pub elite: usize,
    /// Per-gene probability of taking the first parent's value.
    #[serde(default = "default_crossover_probability")]
    pub crossover_probability: f64,
    /// Per-gene probability of rescaling the value.
    #[serde(default = "default_mutation_probability")]
    pub mutation_probability: f64,
    /// Whether higher or lower scores are better.
    #[serde(default)]
    pub direction: ObjectiveDirection,
    /// How the first generation is seeded.
    #[serde(default)]
    pub initial_population: InitialPopulation,
    /// Number of parallel evaluations (0 = auto-detect).
    #[serde(default)]
    pub parallel_workers: usize,
    /// Per-evaluation timeout in seconds. `None` waits indefinitely.
    #[serde(default)]
    pub evaluation_timeout_secs: Option<f64>,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Genes to tune.
    #[serde(default)]
    pub genes: GeneSet,
    /// Measurement settings handed to the evaluator untouched.
    #[serde(default)]
    pub run: RunConfig,
    /// External measurement command used by the CLI.
    #[serde(default)]
    pub command: Option<CommandSpec>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            population: default_population(),
            generations: default_generations(),
            elite: default_elite(),
            crossover_probability: default_crossover_probability(),
            mutation_probability: default_mutation_probability(),
            direction: ObjectiveDirection::default(),
            initial_population: InitialPopulation::default(),
            parallel_workers: 0,
            evaluation_timeout_secs: None,
            random_seed: None,
            genes: GeneSet::default(),
            run: RunConfig::default(),
            command: None,
        }
    }
}

fn default_population() -> usize {
    10
}
fn default_generations() -> usize {
    100
}
fn default_elite() -> usize {
    2
}
fn default_crossover_probability() -> f64 {
    0.1
}
fn default_mutation_probability() -> f64 {
    0.5
}

/// Whether we are maximizing or minimizing the measured score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ObjectiveDirection {
    /// Higher is better (throughput).
    #[default]
    Maximize,
    /// Lower is better (average time).
    Minimize,
}

impl ObjectiveDirection {
    /// Sort key where larger is always better.
    pub fn rank_key(self, score: f64) -> f64 {
        match self {
            Self::Maximize => score,
            Self::Minimize => -score,
        }
    }

    /// Improvement of `score` over `baseline`, as a fraction.
    pub fn improvement(self, score: f64, baseline: f64) -> f64 {
        match self {
            Self::Maximize => score / baseline - 1.0,
            Self::Minimize => baseline / score - 1.0,
        }
    }
}

/// Seeding strategy for the first generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InitialPopulation {
    /// Every chromosome starts from the gene defaults.
    #[default]
    Defaults,
    /// One default chromosome, the rest are mutated copies.
    Perturbed,
}

/// How much output the measurement harness produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Verbosity {
    #[default]
    Silent,
    Normal,
    Extra,
}

impl Verbosity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Normal => "normal",
            Self::Extra => "extra",
        }
    }
}

/// Shared measurement settings.
///
/// The optimizer never interprets these; they are passed by reference to
/// every evaluator call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Warmup duration per iteration in milliseconds.
    #[serde(default = "default_time_ms")]
    pub warmup_time_ms: u64,
    /// Measurement duration per iteration in milliseconds.
    #[serde(default = "default_time_ms")]
    pub measurement_time_ms: u64,
    #[serde(default = "default_iterations")]
    pub warmup_iterations: u32,
    #[serde(default = "default_iterations")]
    pub measurement_iterations: u32,
    /// Number of isolated processes per measurement.
    #[serde(default = "default_forks")]
    pub forks: u32,
    #[serde(default)]
    pub verbosity: Verbosity,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            warmup_time_ms: default_time_ms(),
            measurement_time_ms: default_time_ms(),
            warmup_iterations: default_iterations(),
            measurement_iterations: default_iterations(),
            forks: default_forks(),
            verbosity: Verbosity::default(),
        }
    }
}

fn default_time_ms() -> u64 {
    200
}
fn default_iterations() -> u32 {
    5
}
fn default_forks() -> u32 {
    1
}

impl RunConfig {
    /// Environment variables describing this configuration.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("EVOTUNE_WARMUP_TIME_MS", self.warmup_time_ms.to_string()),
            (
                "EVOTUNE_MEASUREMENT_TIME_MS",
                self.measurement_time_ms.to_string(),
            ),
            ("EVOTUNE_WARMUP_ITERATIONS", self.warmup_iterations.to_string()),
            (
                "EVOTUNE_MEASUREMENT_ITERATIONS",
                self.measurement_iterations.to_string(),
            ),
            ("EVOTUNE_FORKS", self.forks.to_string()),
            ("EVOTUNE_VERBOSITY", self.verbosity.as_str().to_string()),
        ]
    }
}

/// External command that performs one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Fixed arguments placed before the gene arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 1")]
    PopulationTooSmall,
    #[error("Generation count must be at least 1")]
    NoGenerations,
    #[error("Elite count {elite} exceeds population size {population}")]
    EliteTooLarge { elite: usize, population: usize },
    #[error("Invalid probability for {name}: {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("Evaluation timeout must be positive, got {0}")]
    InvalidTimeout(f64),
    #[error("No genes specified")]
    NoGenes,
    #[error("Gene name must not be empty")]
    EmptyGeneName,
    #[error("Duplicate gene name: {0}")]
    DuplicateGene(String),
    #[error("Invalid parameter bounds: {0}")]
    InvalidBounds(String),
    #[error("Argument template must contain {{value}}: {0}")]
    InvalidArgTemplate(String),
    #[error("Expected {expected} gene values, got {actual}")]
    GeneArity { expected: usize, actual: usize },
    #[error("No measurement command configured")]
    MissingCommand,
}

impl TunerConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> TunerResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: TunerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-evaluation timeout, if configured.
    pub fn evaluation_timeout(&self) -> Option<Duration> {
        self.evaluation_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if self.generations == 0 {
            return Err(ConfigError::NoGenerations);
        }
        if self.elite > self.population {
            return Err(ConfigError::EliteTooLarge {
                elite: self.elite,
                population: self.population,
            });
        }

        let check_probability = |value: f64, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidProbability { name, value })
            }
        };
        check_probability(self.crossover_probability, "crossover_probability")?;
        check_probability(self.mutation_probability, "mutation_probability")?;

        if let Some(secs) = self.evaluation_timeout_secs
            && !(secs.is_finite() && secs > 0.0)
        {
            return Err(ConfigError::InvalidTimeout(secs));
        }

        self.genes.validate()
    }
}
