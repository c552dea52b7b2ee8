//! Observable output of a tuning run: per-generation reports and the final result.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ObjectiveDirection, ParameterVector};

/// One scalar measurement returned by an evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Fitness score.
    pub score: f64,
    /// Display unit (e.g. "ops/ms"). Never used in computation.
    pub unit: String,
}

impl Measurement {
    pub fn new(score: f64, unit: impl Into<String>) -> Self {
        Self {
            score,
            unit: unit.into(),
        }
    }
}

/// Row of a generation report.
#[derive(Debug, Clone, Serialize)]
pub struct ChromosomeReport {
    /// Position in the sorted population (0 = best).
    pub rank: usize,
    /// Measured score, `None` when evaluation failed.
    pub score: Option<f64>,
    /// Relative improvement over the baseline in percent.
    pub improvement_percent: Option<f64>,
    /// Failure reason for chromosomes that could not be measured.
    pub failure: Option<String>,
    /// Gene values.
    pub parameters: ParameterVector,
}

/// Everything observed during the reporting phase of one generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// Zero-based generation index.
    pub generation: usize,
    /// Baseline measurement taken for this generation.
    pub baseline: Measurement,
    pub direction: ObjectiveDirection,
    /// Chromosomes in descending fitness order.
    pub chromosomes: Vec<ChromosomeReport>,
}

impl GenerationReport {
    /// Best row of the report.
    pub fn best(&self) -> Option<&ChromosomeReport> {
        self.chromosomes.first()
    }

    /// Number of chromosomes whose evaluation failed.
    pub fn failed_count(&self) -> usize {
        self.chromosomes.iter().filter(|c| c.score.is_none()).count()
    }

    /// Mean score of successfully measured chromosomes.
    pub fn mean_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.chromosomes.iter().filter_map(|c| c.score).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = &self.baseline.unit;
        writeln!(f, "Generation {}", self.generation)?;
        writeln!(f, "---------------------------------------")?;
        writeln!(f, "Baseline score: {:10.2} {}", self.baseline.score, unit)?;
        for row in &self.chromosomes {
            match (row.score, row.improvement_percent) {
                (Some(score), Some(pct)) => writeln!(
                    f,
                    "{:10.2} {} ({:+10.2}%) {}",
                    score, unit, pct, row.parameters
                )?,
                (Some(score), None) => {
                    writeln!(f, "{:10.2} {} ({:>11}) {}", score, unit, "n/a", row.parameters)?
                }
                _ => writeln!(
                    f,
                    "{:>10} {} ({:>11}) {}",
                    "FAILED", unit, "n/a", row.parameters
                )?,
            }
        }
        Ok(())
    }
}

/// Phase of the generational controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TunerPhase {
    /// Building the first population.
    #[default]
    Init,
    /// Measuring the untuned reference configuration.
    EvaluatingBaseline,
    /// Emitting the generation report.
    Reporting,
    /// Producing the next population.
    Breeding,
    /// All generations finished.
    Done,
}

/// Per-generation history for analysis.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TuningHistory {
    /// Baseline score per generation.
    pub baseline_scores: Vec<f64>,
    /// Best chromosome score per generation.
    pub best_scores: Vec<Option<f64>>,
    /// Mean score of measured chromosomes per generation.
    pub mean_scores: Vec<Option<f64>>,
    /// Failed evaluations per generation.
    pub failed_counts: Vec<usize>,
}

impl TuningHistory {
    pub(crate) fn record(&mut self, report: &GenerationReport) {
        self.baseline_scores.push(report.baseline.score);
        self.best_scores.push(report.best().and_then(|c| c.score));
        self.mean_scores.push(report.mean_score());
        self.failed_counts.push(report.failed_count());
    }
}

/// Reason the run stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// All configured generations ran.
    Completed,
    /// Stopped through the cancellation handle.
    Cancelled,
}

/// Statistics from a tuning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningStats {
    /// Generations reported.
    pub generations: usize,
    /// Chromosome evaluations performed (baseline excluded).
    pub total_evaluations: u64,
    /// Evaluations that ended with a failure.
    pub failed_evaluations: u64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
}

/// Final result of a tuning run.
#[derive(Debug, Clone, Serialize)]
pub struct TuningResult {
    /// Best chromosome of the last reported generation.
    pub best: Option<ChromosomeReport>,
    /// Last report emitted.
    pub last_report: Option<GenerationReport>,
    pub history: TuningHistory,
    pub stats: TuningStats,
}
