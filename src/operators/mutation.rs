//! Mutation operators

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::genome::bounds::MultiBounds;
use crate::genome::Genome;
use crate::operators::MutationOperator;

/// Polynomial mutation
///
/// Perturbs genes with the polynomial probability distribution, respecting
/// bounds.
///
/// Reference: Deb, K. (2001). Multi-Objective Optimization using
/// Evolutionary Algorithms.
#[derive(Clone, Debug)]
pub struct PolynomialMutation {
    /// Distribution index; higher values make smaller mutations
    pub eta_m: f64,
    /// Per-gene mutation probability; defaults to 1/n
    pub per_gene_probability: Option<f64>,
}

impl PolynomialMutation {
    /// Create a new polynomial mutation with the given distribution index
    pub fn new(eta_m: f64) -> Self {
        assert!(eta_m >= 0.0, "Distribution index must be non-negative");
        Self {
            eta_m,
            per_gene_probability: None,
        }
    }

    /// Set a fixed mutation probability per gene
    pub fn with_probability(mut self, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "Probability must be in [0, 1]"
        );
        self.per_gene_probability = Some(probability);
        self
    }

    fn mutate_gene<R: Rng>(&self, gene: f64, min: f64, max: f64, rng: &mut R) -> f64 {
        let range = max - min;
        if range <= 0.0 {
            return gene;
        }

        let delta1 = (gene - min) / range;
        let delta2 = (max - gene) / range;

        let u = rng.gen::<f64>();
        let delta_q = if u <= 0.5 {
            let val = 2.0 * u + (1.0 - 2.0 * u) * (1.0 - delta1).powf(self.eta_m + 1.0);
            val.powf(1.0 / (self.eta_m + 1.0)) - 1.0
        } else {
            let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * (1.0 - delta2).powf(self.eta_m + 1.0);
            1.0 - val.powf(1.0 / (self.eta_m + 1.0))
        };

        (gene + delta_q * range).clamp(min, max)
    }
}

impl MutationOperator for PolynomialMutation {
    fn mutate<R: Rng>(&self, genome: &mut Genome, bounds: &MultiBounds, rng: &mut R) {
        let n = genome.len();
        if n == 0 {
            return;
        }
        let prob = self.per_gene_probability.unwrap_or(1.0 / n as f64);

        for i in 0..n {
            if rng.gen::<f64>() < prob {
                if let Some(b) = bounds.get(i) {
                    genome.genes_mut()[i] = self.mutate_gene(genome[i], b.min, b.max, rng);
                }
            }
        }
    }
}

/// Gaussian mutation
///
/// Adds zero-mean Gaussian noise scaled to each gene's range, then clamps.
#[derive(Clone, Debug)]
pub struct GaussianMutation {
    /// Noise standard deviation, as a fraction of each gene's range
    pub sigma: f64,
    /// Per-gene mutation probability; defaults to 1/n
    pub per_gene_probability: Option<f64>,
}

impl GaussianMutation {
    /// Create a new Gaussian mutation with the given relative sigma
    pub fn new(sigma: f64) -> Self {
        assert!(sigma > 0.0, "Sigma must be positive");
        Self {
            sigma,
            per_gene_probability: None,
        }
    }

    /// Set a fixed mutation probability per gene
    pub fn with_probability(mut self, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "Probability must be in [0, 1]"
        );
        self.per_gene_probability = Some(probability);
        self
    }
}

impl MutationOperator for GaussianMutation {
    fn mutate<R: Rng>(&self, genome: &mut Genome, bounds: &MultiBounds, rng: &mut R) {
        let n = genome.len();
        if n == 0 {
            return;
        }
        let prob = self.per_gene_probability.unwrap_or(1.0 / n as f64);

        for i in 0..n {
            if rng.gen::<f64>() < prob {
                if let Some(b) = bounds.get(i) {
                    let scale = self.sigma * b.range();
                    if scale <= 0.0 {
                        continue;
                    }
                    let noise = Normal::new(0.0, scale)
                        .expect("scale is positive and finite")
                        .sample(rng);
                    genome.genes_mut()[i] = b.clamp(genome[i] + noise);
                }
            }
        }
    }
}
