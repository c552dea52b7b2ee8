//! Evolutionary search over numeric parameter vectors.
//!
//! # Overview
//!
//! - **Evaluators** (`evaluator`): the measurement boundary and the harness
//!   that contains slow, failing or panicking measurements
//! - **Command evaluator** (`command`): measurement by external process
//! - **Operators** (`operators`): crossover, mutation and selection draws
//! - **Chromosomes** (`chromosome`): candidates with memoized fitness
//! - **Populations** (`population`): sorted storage and roulette selection
//! - **Engine** (`engine`): the generational loop
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evotune::evolution::{CommandEvaluator, EvolutionEngine};
//! use evotune::schema::{CommandSpec, TunerConfig};
//!
//! let config = TunerConfig::default();
//! let evaluator = CommandEvaluator::new(CommandSpec {
//!     program: "./bench.sh".to_string(),
//!     args: Vec::new(),
//! });
//!
//! let mut engine = EvolutionEngine::new(config, Arc::new(evaluator))?;
//! let result = engine.run_with_callback(|report| println!("{report}"))?;
//!
//! if let Some(best) = result.best {
//!     println!("Best: {}", best.parameters);
//! }
//! # Ok::<(), evotune::TunerError>(())
//! ```

mod chromosome;
mod command;
mod engine;
mod evaluator;
mod operators;
mod population;

pub use chromosome::{Chromosome, Fitness, FitnessState};
pub use command::{CommandEvaluator, parse_measurement};
pub use engine::EvolutionEngine;
pub use evaluator::{EvalError, EvalHarness, Evaluator};
pub use operators::TunerRng;
pub use population::Population;
