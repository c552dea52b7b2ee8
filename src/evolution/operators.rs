//! Genetic operators over parameter vectors.
//!
//! Provides gene-wise crossover, multiplicative mutation and the random draws
//! used by selection.

use rand::prelude::*;
use rand_distr::Open01;

use crate::schema::ParameterVector;

/// Random number generator wrapper for genetic operators.
pub struct TunerRng {
    rng: StdRng,
}

impl TunerRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Build a child gene by gene: with probability `probability` a gene is
    /// taken from `first`, otherwise from `second`. Neither parent changes.
    pub fn crossover(
        &mut self,
        first: &ParameterVector,
        second: &ParameterVector,
        probability: f64,
    ) -> ParameterVector {
        debug_assert!(first.same_layout(second));

        let values = first
            .values()
            .iter()
            .zip(second.values())
            .map(|(&a, &b)| if self.chance(probability) { a } else { b })
            .collect();

        ParameterVector::from_raw(first.gene_set().clone(), values)
    }

    /// Rescale each gene with probability `probability`. Untouched genes are
    /// copied as is.
    pub fn mutate(&mut self, parent: &ParameterVector, probability: f64) -> ParameterVector {
        let values = parent
            .values()
            .iter()
            .map(|&v| {
                if self.chance(probability) {
                    self.rescale(v)
                } else {
                    v
                }
            })
            .collect();

        ParameterVector::from_raw(parent.gene_set().clone(), values)
    }

    /// Multiply or divide by a factor drawn from the open interval (1, 2),
    /// each with equal probability.
    pub fn rescale(&mut self, value: f64) -> f64 {
        let factor = 1.0 + self.rng.sample::<f64, _>(Open01);
        if self.rng.gen_bool(0.5) {
            value / factor
        } else {
            value * factor
        }
    }

    /// Uniform threshold in `[0, total)` for roulette-wheel selection.
    pub fn threshold(&mut self, total: f64) -> f64 {
        self.rng.r#gen::<f64>() * total
    }

    /// Uniform index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// `true` with the given probability. 0 never fires, 1 always does.
    fn chance(&mut self, probability: f64) -> bool {
        self.rng.r#gen::<f64>() < probability
    }
}
