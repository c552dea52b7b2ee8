use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use evotune::schema::{ObjectiveDirection, StopReason};
use evotune::{
    EvalError, Evaluator, EvolutionEngine, GeneSet, GeneSpec, Measurement, ParameterVector,
    RunConfig, TunerConfig, TunerError,
};

/// Deterministic evaluator scoring a vector by the sum of its genes.
#[derive(Default)]
struct SumEvaluator {
    calls: AtomicUsize,
    baselines: AtomicUsize,
    /// Baseline call (zero-based) that fails, if any.
    fail_baseline_at: Option<usize>,
    fail_all: bool,
    delay: Option<Duration>,
}

impl Evaluator for SumEvaluator {
    fn evaluate(&self, params: &ParameterVector, _: &RunConfig) -> Result<Measurement, EvalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.fail_all {
            return Err(EvalError::Failed("rejected flags".into()));
        }
        Ok(Measurement::new(params.values().iter().sum(), "ops/ms"))
    }

    fn baseline(&self, _: &RunConfig) -> Result<Measurement, EvalError> {
        let call = self.baselines.fetch_add(1, Ordering::SeqCst);
        if self.fail_baseline_at == Some(call) {
            return Err(EvalError::Failed("baseline crashed".into()));
        }
        Ok(Measurement::new(100.0, "ops/ms"))
    }
}

fn config() -> TunerConfig {
    TunerConfig {
        population: 8,
        generations: 6,
        elite: 2,
        crossover_probability: 0.5,
        mutation_probability: 0.5,
        parallel_workers: 4,
        random_seed: Some(1234),
        genes: GeneSet::new(vec![
            GeneSpec::int("MaxInlineSize", 35, 1, 1000),
            GeneSpec::int("InlineSmallCode", 1000, 1, 5000),
            GeneSpec::float("Ratio", 1.5, 0.1, 10.0),
        ]),
        ..TunerConfig::default()
    }
}

fn engine(config: TunerConfig, evaluator: Arc<SumEvaluator>) -> EvolutionEngine {
    EvolutionEngine::new(config, evaluator).unwrap()
}

#[test]
fn test_every_generation_reports_full_population() {
    let mut engine = engine(config(), Arc::new(SumEvaluator::default()));
    let mut generations = Vec::new();

    let result = engine
        .run_with_callback(|report| {
            assert_eq!(report.chromosomes.len(), 8);
            assert_eq!(report.baseline.score, 100.0);
            generations.push(report.generation);
        })
        .unwrap();

    assert_eq!(generations, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(result.stats.generations, 6);
    assert_eq!(result.history.best_scores.len(), 6);
    assert_eq!(result.stats.stop_reason, StopReason::Completed);
}

#[test]
fn test_reports_sorted_best_first() {
    let mut engine = engine(config(), Arc::new(SumEvaluator::default()));
    engine
        .run_with_callback(|report| {
            let scores: Vec<f64> = report.chromosomes.iter().filter_map(|c| c.score).collect();
            assert!(scores.windows(2).all(|w| w[0] >= w[1]), "unsorted: {scores:?}");
        })
        .unwrap();
}

#[test]
fn test_elitism_never_loses_best_score() {
    let mut engine = engine(config(), Arc::new(SumEvaluator::default()));
    let result = engine.run().unwrap();

    let best: Vec<f64> = result.history.best_scores.iter().map(|s| s.unwrap()).collect();
    assert!(
        best.windows(2).all(|w| w[1] >= w[0]),
        "best score regressed: {best:?}"
    );
}

#[test]
fn test_minimize_keeps_lowest_first() {
    let config = TunerConfig {
        direction: ObjectiveDirection::Minimize,
        ..config()
    };
    let mut engine = engine(config, Arc::new(SumEvaluator::default()));
    let result = engine.run().unwrap();

    let best: Vec<f64> = result.history.best_scores.iter().map(|s| s.unwrap()).collect();
    assert!(
        best.windows(2).all(|w| w[1] <= w[0]),
        "best score regressed: {best:?}"
    );
    let last = result.last_report.unwrap();
    let scores: Vec<f64> = last.chromosomes.iter().filter_map(|c| c.score).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_all_failures_still_complete() {
    let evaluator = Arc::new(SumEvaluator {
        fail_all: true,
        ..SumEvaluator::default()
    });
    let mut engine = engine(config(), evaluator);
    let mut reports = 0;

    let result = engine
        .run_with_callback(|report| {
            reports += 1;
            assert_eq!(report.failed_count(), 8);
            assert!(report.chromosomes.iter().all(|c| c.failure.is_some()));
        })
        .unwrap();

    assert_eq!(reports, 6);
    assert_eq!(result.stats.failed_evaluations, result.stats.total_evaluations);
    assert!(result.best.unwrap().score.is_none());
}

#[test]
fn test_baseline_failure_aborts_before_first_report() {
    let evaluator = Arc::new(SumEvaluator {
        fail_baseline_at: Some(0),
        ..SumEvaluator::default()
    });
    let mut engine = engine(config(), evaluator);
    let mut reports = 0;

    let err = engine.run_with_callback(|_| reports += 1).unwrap_err();

    assert!(matches!(err, TunerError::Baseline { generation: 0, .. }));
    assert_eq!(reports, 0);
}

#[test]
fn test_baseline_failure_mid_run_stops_reporting() {
    let evaluator = Arc::new(SumEvaluator {
        fail_baseline_at: Some(2),
        ..SumEvaluator::default()
    });
    let mut engine = engine(config(), evaluator);
    let mut reported = Vec::new();

    let err = engine
        .run_with_callback(|report| reported.push(report.generation))
        .unwrap_err();

    assert!(matches!(err, TunerError::Baseline { generation: 2, .. }));
    assert_eq!(reported, vec![0, 1]);
}

#[test]
fn test_slow_evaluations_time_out_as_failures() {
    let evaluator = Arc::new(SumEvaluator {
        delay: Some(Duration::from_millis(300)),
        ..SumEvaluator::default()
    });
    let config = TunerConfig {
        population: 4,
        generations: 2,
        evaluation_timeout_secs: Some(0.02),
        ..config()
    };
    let mut engine = engine(config, evaluator);
    let result = engine.run().unwrap();

    let last = result.last_report.unwrap();
    assert_eq!(last.failed_count(), 4);
    assert!(
        last.chromosomes[0]
            .failure
            .as_deref()
            .unwrap()
            .contains("timed out")
    );
}

#[test]
fn test_cancel_from_callback() {
    let mut engine = engine(config(), Arc::new(SumEvaluator::default()));
    let cancel = engine.cancel_handle();

    let result = engine
        .run_with_callback(|report| {
            if report.generation == 1 {
                cancel.store(true, Ordering::Relaxed);
            }
        })
        .unwrap();

    assert_eq!(result.stats.generations, 2);
    assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
    assert_eq!(result.last_report.unwrap().generation, 1);
}

#[test]
fn test_evaluation_count_matches_evaluator_calls() {
    let evaluator = Arc::new(SumEvaluator::default());
    let mut engine = engine(config(), Arc::clone(&evaluator));
    let result = engine.run().unwrap();

    let calls = evaluator.calls.load(Ordering::SeqCst) as u64;
    assert_eq!(result.stats.total_evaluations, calls);
    // Elites are never re-measured.
    assert_eq!(calls, 8 + 5 * (8 - 2));
    assert_eq!(evaluator.baselines.load(Ordering::SeqCst), 6);
}

#[test]
fn test_seeded_runs_reproducible() {
    let run = || {
        let mut engine = engine(config(), Arc::new(SumEvaluator::default()));
        engine.run().unwrap()
    };
    let (a, b) = (run(), run());

    assert_eq!(a.history.best_scores, b.history.best_scores);
    assert_eq!(a.history.mean_scores, b.history.mean_scores);
    assert_eq!(
        a.best.unwrap().parameters.values(),
        b.best.unwrap().parameters.values()
    );
}

#[test]
fn test_result_serializes() {
    let mut engine = engine(
        TunerConfig {
            generations: 2,
            ..config()
        },
        Arc::new(SumEvaluator::default()),
    );
    let result = engine.run().unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["stats"]["generations"], 2);
    assert!(json["best"]["parameters"]["MaxInlineSize"].is_number());
}
