//! Genome representation and codec
//!
//! A genome is a fixed-order real vector with one gene per user-constrained
//! parameter. The order is fixed when the codec is built and never changes for
//! the lifetime of a run, so positional operations (decode, crossover, slot
//! reconciliation) stay aligned across generations.

pub mod bounds;
pub mod codec;

use rand::Rng;
use serde::{Deserialize, Serialize};

use self::bounds::MultiBounds;

/// Fixed-order real vector over the constrained parameter subset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genome {
    genes: Vec<f64>,
}

impl Genome {
    /// Create a genome from raw genes
    pub fn new(genes: Vec<f64>) -> Self {
        Self { genes }
    }

    /// Number of genes
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Check if the genome has no genes
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Get a reference to the genes
    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    /// Get a mutable reference to the genes
    pub fn genes_mut(&mut self) -> &mut [f64] {
        &mut self.genes
    }

    /// Take the genes out of this genome
    pub fn into_inner(self) -> Vec<f64> {
        self.genes
    }

    /// Sample a genome uniformly at random within the given bounds
    pub fn random<R: Rng>(bounds: &MultiBounds, rng: &mut R) -> Self {
        let genes = bounds
            .bounds
            .iter()
            .map(|b| rng.gen_range(b.min..=b.max))
            .collect();
        Self { genes }
    }

    /// Clamp every gene into its bounds in place
    pub fn clamp_to(&mut self, bounds: &MultiBounds) {
        bounds.clamp_vec(&mut self.genes);
    }

    /// Euclidean distance to another genome
    pub fn distance(&self, other: &Self) -> f64 {
        self.genes
            .iter()
            .zip(other.genes.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl std::ops::Index<usize> for Genome {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.genes[index]
    }
}

pub mod prelude {
    pub use super::bounds::{Bounds, MultiBounds};
    pub use super::codec::{ConstraintSet, GenomeCodec, ParameterConstraint};
    pub use super::Genome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_genome_random_respects_bounds() {
        let bounds: MultiBounds = vec![(0.0, 1.0), (-1.0, 1.0), (100.0, 200.0)]
            .into_iter()
            .collect();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let g = Genome::random(&bounds, &mut rng);
            assert!(bounds.contains_vec(g.genes()));
        }
    }

    #[test]
    fn test_genome_clamp_to() {
        let bounds: MultiBounds = vec![(0.0, 1.0), (-1.0, 1.0)].into_iter().collect();
        let mut g = Genome::new(vec![3.0, -7.0]);
        g.clamp_to(&bounds);
        assert_eq!(g.genes(), &[1.0, -1.0]);
    }

    #[test]
    fn test_genome_distance() {
        let a = Genome::new(vec![0.0, 0.0]);
        let b = Genome::new(vec![3.0, 4.0]);
        assert_eq!(a.distance(&b), 5.0);
    }
}
