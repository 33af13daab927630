//! Crossover operators

use rand::Rng;

use crate::genome::bounds::MultiBounds;
use crate::genome::Genome;
use crate::operators::CrossoverOperator;

/// Simulated Binary Crossover (SBX)
///
/// Perturbs each gene pair with a spread factor whose distribution mimics
/// single-point crossover on binary strings.
///
/// Reference: Deb, K., & Agrawal, R. B. (1995). Simulated Binary Crossover
/// for Continuous Search Space.
#[derive(Clone, Debug)]
pub struct SbxCrossover {
    /// Distribution index; higher values keep offspring closer to parents
    pub eta: f64,
    /// Per-gene crossover probability
    pub per_gene_probability: f64,
}

impl SbxCrossover {
    /// Create a new SBX crossover with the given distribution index
    pub fn new(eta: f64) -> Self {
        assert!(eta >= 0.0, "Distribution index must be non-negative");
        Self {
            eta,
            per_gene_probability: 0.9,
        }
    }

    /// Set the per-gene crossover probability
    pub fn with_probability(mut self, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "Probability must be in [0, 1]"
        );
        self.per_gene_probability = probability;
        self
    }

    fn spread_factor(&self, u: f64) -> f64 {
        if u <= 0.5 {
            (2.0 * u).powf(1.0 / (self.eta + 1.0))
        } else {
            (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (self.eta + 1.0))
        }
    }
}

impl CrossoverOperator for SbxCrossover {
    fn crossover<R: Rng>(
        &self,
        parent1: &Genome,
        parent2: &Genome,
        bounds: &MultiBounds,
        rng: &mut R,
    ) -> (Genome, Genome) {
        assert_eq!(
            parent1.len(),
            parent2.len(),
            "Parent genome lengths must match"
        );

        let mut child1 = parent1.genes().to_vec();
        let mut child2 = parent2.genes().to_vec();

        for i in 0..child1.len() {
            if rng.gen::<f64>() >= self.per_gene_probability {
                continue;
            }
            let x1 = parent1[i];
            let x2 = parent2[i];
            // Identical genes produce identical offspring
            if (x1 - x2).abs() <= 1e-14 {
                continue;
            }

            let beta = self.spread_factor(rng.gen::<f64>());
            child1[i] = 0.5 * ((1.0 + beta) * x1 + (1.0 - beta) * x2);
            child2[i] = 0.5 * ((1.0 - beta) * x1 + (1.0 + beta) * x2);

            if let Some(b) = bounds.get(i) {
                child1[i] = b.clamp(child1[i]);
                child2[i] = b.clamp(child2[i]);
            }
        }

        (Genome::new(child1), Genome::new(child2))
    }
}

/// Blend crossover (BLX-α)
///
/// Samples each child gene uniformly from the parents' range extended by a
/// fraction α on both sides.
#[derive(Clone, Debug)]
pub struct BlendCrossover {
    /// Range extension fraction
    pub alpha: f64,
}

impl BlendCrossover {
    /// Create a blend crossover with the given α
    pub fn new(alpha: f64) -> Self {
        assert!(alpha >= 0.0, "Alpha must be non-negative");
        Self { alpha }
    }
}

impl Default for BlendCrossover {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl CrossoverOperator for BlendCrossover {
    fn crossover<R: Rng>(
        &self,
        parent1: &Genome,
        parent2: &Genome,
        bounds: &MultiBounds,
        rng: &mut R,
    ) -> (Genome, Genome) {
        assert_eq!(
            parent1.len(),
            parent2.len(),
            "Parent genome lengths must match"
        );

        let mut sample = |i: usize, rng: &mut R| {
            let (lo, hi) = if parent1[i] <= parent2[i] {
                (parent1[i], parent2[i])
            } else {
                (parent2[i], parent1[i])
            };
            let extent = (hi - lo) * self.alpha;
            let mut value = if hi - lo > 0.0 || extent > 0.0 {
                rng.gen_range((lo - extent)..=(hi + extent))
            } else {
                lo
            };
            if let Some(b) = bounds.get(i) {
                value = b.clamp(value);
            }
            value
        };

        let child1: Vec<f64> = (0..parent1.len()).map(|i| sample(i, rng)).collect();
        let child2: Vec<f64> = (0..parent1.len()).map(|i| sample(i, rng)).collect();

        (Genome::new(child1), Genome::new(child2))
    }
}
