//! Selection operators

use rand::seq::SliceRandom;
use rand::Rng;

use crate::genome::Genome;
use crate::operators::SelectionOperator;

/// Tournament selection
///
/// Draws a random subset of the population and keeps the fittest entrant
/// (the one with the LOWEST fitness, under the minimization convention).
#[derive(Clone, Debug)]
pub struct TournamentSelection {
    /// Number of individuals competing per tournament
    pub tournament_size: usize,
}

impl TournamentSelection {
    /// Create a new tournament selection with the given size
    pub fn new(tournament_size: usize) -> Self {
        assert!(tournament_size >= 1, "Tournament size must be at least 1");
        Self { tournament_size }
    }

    /// Create binary tournament selection (size = 2)
    pub fn binary() -> Self {
        Self::new(2)
    }
}

impl SelectionOperator for TournamentSelection {
    fn select<R: Rng>(&self, scored: &[(Genome, f64)], rng: &mut R) -> usize {
        assert!(!scored.is_empty(), "Population cannot be empty");

        let tournament_size = self.tournament_size.min(scored.len());
        let indices: Vec<usize> = (0..scored.len()).collect();

        indices
            .choose_multiple(rng, tournament_size)
            .copied()
            .min_by(|&a, &b| {
                scored[a]
                    .1
                    .partial_cmp(&scored[b].1)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap()
    }
}
