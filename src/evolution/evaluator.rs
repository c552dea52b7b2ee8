//! The measurement boundary: evaluators and the harness that isolates them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use log::warn;

use crate::schema::{Measurement, ParameterVector, RunConfig};

/// External collaborator that measures one parameter vector.
///
/// Implementations may be slow and noisy, but every call must be isolated
/// from every other call: the harness runs them concurrently. Every call
/// must eventually return; a call that overruns the harness timeout keeps
/// its thread until it does.
pub trait Evaluator: Send + Sync + 'static {
    /// Measure a candidate parameter vector.
    fn evaluate(&self, params: &ParameterVector, run: &RunConfig)
    -> Result<Measurement, EvalError>;

    /// Measure the untuned reference configuration.
    fn baseline(&self, run: &RunConfig) -> Result<Measurement, EvalError>;

    /// Human-readable evaluator name.
    fn name(&self) -> &str {
        "evaluator"
    }
}

/// Reasons an evaluation produced no usable score.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("evaluation failed: {0}")]
    Failed(String),
    #[error("evaluation timed out after {0:?}")]
    TimedOut(Duration),
    #[error("evaluation returned non-finite score {0}")]
    NonFinite(f64),
    #[error("evaluator panicked")]
    Panicked,
    #[error("failed to launch measurement: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("failed to read measurement output: {0}")]
    Output(std::io::Error),
    #[error("could not parse measurement output: {0}")]
    Parse(String),
}

/// Runs evaluator calls with failure isolation and an optional timeout.
///
/// With a timeout each call runs on its own thread. A call that overruns is
/// abandoned, not killed: the thread finishes in the background and its
/// result is dropped. Abandoned calls are counted and logged.
#[derive(Clone)]
pub struct EvalHarness {
    evaluator: Arc<dyn Evaluator>,
    timeout: Option<Duration>,
    abandoned: Arc<AtomicUsize>,
}

impl EvalHarness {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            timeout: None,
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Calls that overran the timeout and were left running.
    pub fn abandoned_calls(&self) -> usize {
        self.abandoned.load(Ordering::Relaxed)
    }

    pub fn evaluator_name(&self) -> &str {
        self.evaluator.name()
    }

    /// Measure a candidate.
    pub fn measure(
        &self,
        params: &ParameterVector,
        run: &Arc<RunConfig>,
    ) -> Result<Measurement, EvalError> {
        let evaluator = Arc::clone(&self.evaluator);
        let params = params.clone();
        let run = Arc::clone(run);
        self.call(move || evaluator.evaluate(&params, &run))
    }

    /// Measure the reference configuration.
    pub fn measure_baseline(&self, run: &Arc<RunConfig>) -> Result<Measurement, EvalError> {
        let evaluator = Arc::clone(&self.evaluator);
        let run = Arc::clone(run);
        self.call(move || evaluator.baseline(&run))
    }

    fn call<F>(&self, f: F) -> Result<Measurement, EvalError>
    where
        F: FnOnce() -> Result<Measurement, EvalError> + Send + 'static,
    {
        let result = match self.timeout {
            None => panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or(Err(EvalError::Panicked)),
            Some(timeout) => {
                let (tx, rx) = mpsc::channel();
                thread::Builder::new()
                    .name("evotune-eval".to_string())
                    .spawn(move || {
                        let _ = tx.send(f());
                    })
                    .map_err(thread_start_error)?;

                match rx.recv_timeout(timeout) {
                    Ok(result) => result,
                    Err(RecvTimeoutError::Timeout) => {
                        let abandoned = self.abandoned.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            "{} overran {:?} ({} calls abandoned so far)",
                            self.evaluator.name(),
                            timeout,
                            abandoned
                        );
                        Err(EvalError::TimedOut(timeout))
                    }
                    // The sender only disappears without sending if `f` panicked.
                    Err(RecvTimeoutError::Disconnected) => Err(EvalError::Panicked),
                }
            }
        };

        result.and_then(|m| {
            if m.score.is_finite() {
                Ok(m)
            } else {
                Err(EvalError::NonFinite(m.score))
            }
        })
    }
}

fn thread_start_error(err: std::io::Error) -> EvalError {
    EvalError::Failed(format!("could not start evaluation thread: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::warn;

use crate::schema::{GeneSet, GeneSpec};

    struct Fixed(f64);

    impl Evaluator for Fixed {
        fn evaluate(&self, params: &ParameterVector, _: &RunConfig) -> Result<Measurement, EvalError> {
            Ok(Measurement::new(self.0 + params.values()[0], "ops/s"))
        }

        fn baseline(&self, _: &RunConfig) -> Result<Measurement, EvalError> {
            Ok(Measurement::new(self.0, "ops/s"))
        }
    }

    struct Slow;

    impl Evaluator for Slow {
        fn evaluate(&self, _: &ParameterVector, _: &RunConfig) -> Result<Measurement, EvalError> {
            thread::sleep(Duration::from_millis(500));
            Ok(Measurement::new(1.0, "ops/s"))
        }

        fn baseline(&self, _: &RunConfig) -> Result<Measurement, EvalError> {
            panic!("baseline exploded")
        }
    }

    fn vector() -> ParameterVector {
        Arc::new(GeneSet::new(vec![GeneSpec::int("x", 2, 0, 10)])).defaults()
    }

    #[test]
    fn test_measure_passes_through() {
        let harness = EvalHarness::new(Arc::new(Fixed(10.0)));
        let run = Arc::new(RunConfig::default());
        assert_eq!(harness.measure(&vector(), &run).unwrap().score, 12.0);
        assert_eq!(harness.measure_baseline(&run).unwrap().score, 10.0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let harness = EvalHarness::new(Arc::new(Fixed(f64::NAN)));
        let run = Arc::new(RunConfig::default());
        assert!(matches!(
            harness.measure_baseline(&run),
            Err(EvalError::NonFinite(_))
        ));
    }

    #[test]
    fn test_timeout() {
        let harness =
            EvalHarness::new(Arc::new(Slow)).with_timeout(Some(Duration::from_millis(20)));
        let run = Arc::new(RunConfig::default());
        assert_eq!(harness.abandoned_calls(), 0);
        assert!(matches!(
            harness.measure(&vector(), &run),
            Err(EvalError::TimedOut(_))
        ));
        assert_eq!(harness.abandoned_calls(), 1);
        assert_eq!(harness.clone().abandoned_calls(), 1);
    }

    #[test]
    fn test_thread_start_failure_is_not_a_launch_error() {
        let err = thread_start_error(std::io::Error::other("out of threads"));
        assert!(matches!(err, EvalError::Failed(_)));
        let text = err.to_string();
        assert!(text.contains("evaluation thread"));
        assert!(!text.contains("launch"));
    }

    #[test]
    fn test_panic_contained() {
        let run = Arc::new(RunConfig::default());

        let harness = EvalHarness::new(Arc::new(Slow));
        assert!(matches!(
            harness.measure_baseline(&run),
            Err(EvalError::Panicked)
        ));

        let harness = harness.with_timeout(Some(Duration::from_secs(5)));
        assert!(matches!(
            harness.measure_baseline(&run),
            Err(EvalError::Panicked)
        ));
    }
}
