//! Variation operators
//!
//! The evolutionary driver treats selection, crossover and mutation as an
//! injected strategy: it hands over validated parents and expects offspring
//! genomes back, re-clamping them to bounds defensively. Everything else
//! about the operators (their math, their tuning) is this module's business.
//!
//! Fitness is minimized throughout: selection prefers LOWER values.

pub mod crossover;
pub mod mutation;
pub mod selection;

use rand::Rng;

use crate::genome::bounds::MultiBounds;
use crate::genome::Genome;

/// Selection operator: picks a parent index from a scored population
pub trait SelectionOperator: Send + Sync {
    /// Select one individual; returns its index into `scored`
    ///
    /// `scored` pairs each genome with its fitness (lower is better).
    fn select<R: Rng>(&self, scored: &[(Genome, f64)], rng: &mut R) -> usize;
}

/// Crossover operator: combines two parents into two offspring
pub trait CrossoverOperator: Send + Sync {
    /// Produce two children from two parents, within bounds
    fn crossover<R: Rng>(
        &self,
        parent1: &Genome,
        parent2: &Genome,
        bounds: &MultiBounds,
        rng: &mut R,
    ) -> (Genome, Genome);
}

/// Mutation operator: perturbs a genome in place
pub trait MutationOperator: Send + Sync {
    /// Mutate the genome, keeping genes within bounds
    fn mutate<R: Rng>(&self, genome: &mut Genome, bounds: &MultiBounds, rng: &mut R);
}

pub mod prelude {
    pub use super::crossover::{BlendCrossover, SbxCrossover};
    pub use super::mutation::{GaussianMutation, PolynomialMutation};
    pub use super::selection::TournamentSelection;
    pub use super::{CrossoverOperator, MutationOperator, SelectionOperator};
}
