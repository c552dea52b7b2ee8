//! Generational controller: evaluate, report, keep elites, breed, repeat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, error, info};
use rayon::ThreadPool;

use crate::error::{TunerError, TunerResult};
use crate::schema::{
    GeneSet, GenerationReport, InitialPopulation, Measurement, RunConfig, StopReason,
    TunerConfig, TunerPhase, TuningHistory, TuningResult, TuningStats,
};

use super::chromosome::{Chromosome, Fitness};
use super::evaluator::{EvalHarness, Evaluator};
use super::operators::TunerRng;
use super::population::Population;

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: TunerConfig,
    genes: Arc<GeneSet>,
    run: Arc<RunConfig>,
    harness: EvalHarness,
    pool: ThreadPool,
    rng: TunerRng,
    population: Population,
    phase: TunerPhase,
    generation: usize,
    evaluations: u64,
    failed_evaluations: u64,
    history: TuningHistory,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create a new evolution engine.
    pub fn new(config: TunerConfig, evaluator: Arc<dyn Evaluator>) -> TunerResult<Self> {
        config.validate()?;

        let rng = match config.random_seed {
            Some(seed) => TunerRng::new(seed),
            None => TunerRng::random(),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_workers)
            .thread_name(|i| format!("evotune-worker-{i}"))
            .build()?;
        let harness = EvalHarness::new(evaluator).with_timeout(config.evaluation_timeout());

        Ok(Self {
            genes: Arc::new(config.genes.clone()),
            run: Arc::new(config.run.clone()),
            population: Population::new(config.direction),
            config,
            harness,
            pool,
            rng,
            phase: TunerPhase::Init,
            generation: 0,
            evaluations: 0,
            failed_evaluations: 0,
            history: TuningHistory::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn phase(&self) -> TunerPhase {
        self.phase
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    fn set_phase(&mut self, phase: TunerPhase) {
        debug!("Generation {}: {:?} -> {:?}", self.generation, self.phase, phase);
        self.phase = phase;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Build and evaluate the first population.
    pub fn initialize(&mut self) {
        self.set_phase(TunerPhase::Init);
        self.generation = 0;
        self.evaluations = 0;
        self.failed_evaluations = 0;
        self.history = TuningHistory::default();

        let seed = Chromosome::new(self.genes.defaults(), Arc::clone(&self.run));
        let mut chromosomes = Vec::with_capacity(self.config.population);
        for i in 0..self.config.population {
            let chromosome = match self.config.initial_population {
                InitialPopulation::Perturbed if i > 0 => {
                    seed.mutate(self.config.mutation_probability, &mut self.rng)
                }
                _ => seed.clone(),
            };
            chromosomes.push(chromosome);
        }

        info!(
            "Initialized population of {} with {} genes (evaluator: {})",
            chromosomes.len(),
            self.genes.len(),
            self.harness.evaluator_name()
        );
        self.population = self.evaluate(chromosomes);
    }

    /// Evaluate all pending chromosomes and sort them into a population.
    fn evaluate(&mut self, chromosomes: Vec<Chromosome>) -> Population {
        let pending = chromosomes.iter().filter(|c| c.fitness().is_none()).count();
        let failed_before = chromosomes
            .iter()
            .filter(|c| c.fitness().is_some_and(Fitness::is_failed))
            .count();

        let population =
            Population::evaluate_all(self.config.direction, chromosomes, &self.harness, &self.pool);

        let failed = population.failed_count() - failed_before;
        self.evaluations += pending as u64;
        self.failed_evaluations += failed as u64;
        debug!("Evaluated {pending} chromosomes, {failed} failed");

        population
    }

    /// Measure the reference configuration. Failure ends the run.
    fn evaluate_baseline(&mut self) -> TunerResult<Measurement> {
        self.set_phase(TunerPhase::EvaluatingBaseline);
        self.harness.measure_baseline(&self.run).map_err(|source| {
            error!(
                "Baseline evaluation failed in generation {}: {}",
                self.generation, source
            );
            TunerError::Baseline {
                generation: self.generation,
                source,
            }
        })
    }

    fn report(&mut self, baseline: Measurement) -> GenerationReport {
        self.set_phase(TunerPhase::Reporting);
        let report = GenerationReport {
            generation: self.generation,
            chromosomes: self.population.report_rows(&baseline),
            direction: self.config.direction,
            baseline,
        };
        self.history.record(&report);

        let best = report.best().and_then(|c| c.score);
        info!(
            "Generation {}: baseline={:.4} best={} failed={}/{}",
            report.generation,
            report.baseline.score,
            best.map_or_else(|| "FAILED".to_string(), |s| format!("{s:.4}")),
            report.failed_count(),
            report.chromosomes.len()
        );

        report
    }

    /// Produce the next generation: elites first, then bred offspring.
    fn breed(&mut self) -> Population {
        self.set_phase(TunerPhase::Breeding);
        let size = self.config.population;
        let px = self.config.crossover_probability;
        let pm = self.config.mutation_probability;

        let mut next_gen: Vec<Chromosome> = Vec::with_capacity(size);
        next_gen.extend(self.population.elites(self.config.elite).iter().cloned());

        while next_gen.len() < size {
            let (Some(p1), Some(p2)) = (
                self.population.select_to_breed(&mut self.rng),
                self.population.select_to_breed(&mut self.rng),
            ) else {
                break;
            };
            let (p1, p2) = (p1.clone(), p2.clone());

            next_gen.push(p1.crossover(&p2, px, &mut self.rng).mutate(pm, &mut self.rng));
            let second = p2.crossover(&p1, px, &mut self.rng).mutate(pm, &mut self.rng);
            if next_gen.len() < size {
                next_gen.push(second);
            }
        }

        debug!(
            "Bred {} offspring next to {} elites",
            next_gen.len() - self.config.elite.min(next_gen.len()),
            self.config.elite
        );
        self.evaluate(next_gen)
    }

    /// Run tuning, calling `callback` with each generation report.
    ///
    /// A failed baseline measurement aborts the run before that
    /// generation's report is emitted.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> TunerResult<TuningResult>
    where
        F: FnMut(&GenerationReport),
    {
        let start_time = Instant::now();
        self.initialize();

        let generations = self.config.generations;
        let mut last_report = None;
        let mut reported = 0;
        let mut stop_reason = StopReason::Completed;

        for generation in 0..generations {
            if self.is_cancelled() {
                info!("Cancelled before generation {generation}");
                stop_reason = StopReason::Cancelled;
                break;
            }
            self.generation = generation;

            let baseline = self.evaluate_baseline()?;
            let report = self.report(baseline);
            callback(&report);
            reported += 1;
            last_report = Some(report);

            // The population bred after the last report would never be used.
            if generation + 1 < generations && !self.is_cancelled() {
                self.population = self.breed();
            }
        }

        self.set_phase(TunerPhase::Done);

        let best = last_report.as_ref().and_then(|r| r.best().cloned());
        Ok(TuningResult {
            best,
            last_report,
            history: self.history.clone(),
            stats: TuningStats {
                generations: reported,
                total_evaluations: self.evaluations,
                failed_evaluations: self.failed_evaluations,
                elapsed_seconds: start_time.elapsed().as_secs_f64(),
                stop_reason,
            },
        })
    }

    /// Run tuning (blocking).
    pub fn run(&mut self) -> TunerResult<TuningResult> {
        self.run_with_callback(|_| {})
    }
}
