//! Evotune - evolutionary tuning of numeric parameters against a noisy
//! black-box benchmark.
//!
//! A population of parameter vectors is measured by an [`Evaluator`],
//! ranked, and bred with elitism, roulette-wheel selection, gene-wise
//! crossover and multiplicative mutation. Each generation is reported
//! relative to a freshly measured baseline of the untuned configuration.
//!
//! # Architecture
//!
//! - `schema`: Configuration, gene definitions and report types
//! - `evolution`: Evaluators, genetic operators, populations and the engine
//! - `error`: Crate-level error type
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evotune::{EvolutionEngine, Evaluator, EvalError, Measurement, ParameterVector, RunConfig, TunerConfig};
//!
//! struct Synthetic;
//!
//! impl Evaluator for Synthetic {
//!     fn evaluate(&self, params: &ParameterVector, _: &RunConfig) -> Result<Measurement, EvalError> {
//!         Ok(Measurement::new(params.values().iter().sum(), "ops/s"))
//!     }
//!
//!     fn baseline(&self, _: &RunConfig) -> Result<Measurement, EvalError> {
//!         Ok(Measurement::new(1000.0, "ops/s"))
//!     }
//! }
//!
//! let mut engine = EvolutionEngine::new(TunerConfig::default(), Arc::new(Synthetic))?;
//! let result = engine.run()?;
//! println!("Evaluations: {}", result.stats.total_evaluations);
//! # Ok::<(), evotune::TunerError>(())
//! ```

pub mod error;
pub mod evolution;
pub mod schema;

// Re-export commonly used types
pub use error::{TunerError, TunerResult};
pub use evolution::{CommandEvaluator, EvalError, Evaluator, EvolutionEngine};
pub use schema::{
    GeneSet, GeneSpec, GenerationReport, Measurement, ParameterVector, RunConfig, TunerConfig,
    TuningResult,
};
