//! Sorted populations and fitness-proportionate selection.

use log::debug;
use rayon::ThreadPool;
use rayon::prelude::*;

use crate::schema::{ChromosomeReport, Measurement, ObjectiveDirection};

use super::chromosome::{Chromosome, Fitness};
use super::evaluator::EvalHarness;
use super::operators::TunerRng;

/// Chromosomes kept in descending fitness order.
///
/// Every member is evaluated before it is placed, so ordering only ever
/// reads cached scores.
#[derive(Debug, Clone)]
pub struct Population {
    direction: ObjectiveDirection,
    members: Vec<Chromosome>,
}

impl Population {
    /// Create an empty population.
    pub fn new(direction: ObjectiveDirection) -> Self {
        Self {
            direction,
            members: Vec::new(),
        }
    }

    /// Evaluate every unscored chromosome on `pool`, then sort.
    pub fn evaluate_all(
        direction: ObjectiveDirection,
        chromosomes: Vec<Chromosome>,
        harness: &EvalHarness,
        pool: &ThreadPool,
    ) -> Self {
        pool.install(|| {
            chromosomes.par_iter().for_each(|chromosome| {
                chromosome.score(harness);
            });
        });

        let mut population = Self {
            direction,
            members: chromosomes,
        };
        population.sort();
        population
    }

    /// Evaluate `chromosome` and insert it at its sorted position.
    ///
    /// Equal scores keep insertion order.
    pub fn add(&mut self, chromosome: Chromosome, harness: &EvalHarness) {
        chromosome.score(harness);
        let key = chromosome.rank_key(self.direction);
        let idx = self
            .members
            .partition_point(|m| m.rank_key(self.direction) >= key);
        self.members.insert(idx, chromosome);
    }

    fn sort(&mut self) {
        let direction = self.direction;
        self.members
            .sort_by(|a, b| b.rank_key(direction).total_cmp(&a.rank_key(direction)));
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Chromosomes in descending fitness order.
    pub fn all(&self) -> &[Chromosome] {
        &self.members
    }

    pub fn best(&self) -> Option<&Chromosome> {
        self.members.first()
    }

    /// The `count` best chromosomes.
    pub fn elites(&self, count: usize) -> &[Chromosome] {
        &self.members[..count.min(self.members.len())]
    }

    /// Number of members whose evaluation failed.
    pub fn failed_count(&self) -> usize {
        self.members
            .iter()
            .filter(|c| c.fitness().is_some_and(Fitness::is_failed))
            .count()
    }

    /// Mean score of successfully measured members.
    pub fn mean_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .members
            .iter()
            .filter_map(|c| c.fitness().and_then(Fitness::score))
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }

    /// Rank key that weighs nothing on the roulette wheel.
    ///
    /// Maximize measures scores from zero. Minimize measures them from the
    /// worst measured score, so the weight grows with rank for any sign.
    pub fn weight_origin(&self) -> f64 {
        match self.direction {
            ObjectiveDirection::Maximize => 0.0,
            ObjectiveDirection::Minimize => self
                .members
                .iter()
                .filter_map(|c| c.fitness().and_then(Fitness::score))
                .map(|s| self.direction.rank_key(s))
                .reduce(f64::min)
                .unwrap_or(0.0),
        }
    }

    /// Sum of all roulette weights.
    pub fn total_weight(&self) -> f64 {
        let origin = self.weight_origin();
        self.members
            .iter()
            .map(|c| c.selection_weight(self.direction, origin))
            .sum()
    }

    /// Walk the sorted members accumulating weights and return the first
    /// one whose cumulative weight exceeds `threshold`.
    ///
    /// Zero-weight members are never returned. A threshold at or past the
    /// total resolves to the last member with positive weight; `None` means
    /// no member has any weight.
    pub fn select_with_threshold(&self, threshold: f64) -> Option<&Chromosome> {
        let origin = self.weight_origin();
        let mut cumulative = 0.0;
        let mut last = None;
        for chromosome in &self.members {
            let weight = chromosome.selection_weight(self.direction, origin);
            if weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            last = Some(chromosome);
            if threshold < cumulative {
                return last;
            }
        }
        last
    }

    /// Roulette-wheel selection of a parent.
    ///
    /// Falls back to a uniform pick when the total weight is not positive
    /// and finite. Returns `None` only for an empty population.
    pub fn select_to_breed(&self, rng: &mut TunerRng) -> Option<&Chromosome> {
        if self.members.is_empty() {
            return None;
        }

        let total = self.total_weight();
        if !(total.is_finite() && total > 0.0) {
            debug!("Degenerate fitness total {total}, selecting uniformly");
            return self.members.get(rng.index(self.members.len()));
        }

        let threshold = rng.threshold(total);
        self.select_with_threshold(threshold)
    }

    /// Report rows relative to `baseline`, best first.
    pub fn report_rows(&self, baseline: &Measurement) -> Vec<ChromosomeReport> {
        self.members
            .iter()
            .enumerate()
            .map(|(rank, chromosome)| {
                let fitness = chromosome.fitness();
                let score = fitness.and_then(Fitness::score);
                let improvement_percent = score
                    .map(|s| self.direction.improvement(s, baseline.score) * 100.0)
                    .filter(|pct| pct.is_finite());
                let failure = match fitness {
                    Some(Fitness::Failed { reason }) => Some(reason.clone()),
                    Some(Fitness::Scored(_)) => None,
                    None => Some("not evaluated".to_string()),
                };

                ChromosomeReport {
                    rank,
                    score,
                    improvement_percent,
                    failure,
                    parameters: chromosome.parameters().clone(),
                }
            })
            .collect()
    }
}
