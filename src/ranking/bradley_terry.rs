//! Bradley-Terry strength fitting
//!
//! Fits the Bradley-Terry model `P(i beats j) = π_i / (π_i + π_j)` to judged
//! pairs with the MM (minorization-maximization) algorithm: simple, and the
//! likelihood increases monotonically at every step, so it cannot diverge on
//! the small comparison sets a human produces in one session.

use std::collections::HashMap;

use super::CandidateId;

/// A judged comparison, reduced to its winner and loser
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JudgedPair {
    /// Candidate the human preferred
    pub winner: CandidateId,
    /// Candidate the human passed over
    pub loser: CandidateId,
}

/// Result of an MM fit
#[derive(Clone, Debug)]
pub struct BradleyTerryFit {
    /// Raw strength parameters π, normalized to sum to the candidate count
    pub strengths: HashMap<CandidateId, f64>,
    /// Iterations actually run
    pub iterations: usize,
    /// Whether the parameter change dropped below tolerance
    pub converged: bool,
}

/// Floor for candidates with no recorded win, keeping π strictly positive
const MIN_STRENGTH: f64 = 1e-3;

/// Fit strengths to judged pairs
///
/// Candidates that appear in `candidates` but in no judged pair keep a
/// uniform strength of 1. Pairs referencing unknown candidates are skipped.
pub fn fit_mm(
    pairs: &[JudgedPair],
    candidates: &[CandidateId],
    max_iterations: usize,
    tolerance: f64,
) -> BradleyTerryFit {
    let n = candidates.len();
    let index: HashMap<CandidateId, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();

    let mut wins = vec![0usize; n];
    let mut matches: Vec<Vec<usize>> = vec![Vec::new(); n];
    for pair in pairs {
        let (Some(&w), Some(&l)) = (index.get(&pair.winner), index.get(&pair.loser)) else {
            continue;
        };
        wins[w] += 1;
        matches[w].push(l);
        matches[l].push(w);
    }

    let mut pi = vec![1.0; n];
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..max_iterations {
        iterations = iter + 1;
        let mut next = vec![0.0; n];

        for i in 0..n {
            if matches[i].is_empty() {
                next[i] = pi[i];
                continue;
            }
            if wins[i] == 0 {
                next[i] = MIN_STRENGTH;
                continue;
            }

            // MM update: π_i <- wins_i / Σ_j 1/(π_i + π_j) over i's matches
            let denom: f64 = matches[i].iter().map(|&j| 1.0 / (pi[i] + pi[j])).sum();
            next[i] = wins[i] as f64 / denom;
        }

        // Rescale so strengths sum to n; the model is only identified up to
        // a multiplicative constant.
        let sum: f64 = next.iter().sum();
        if sum > 0.0 {
            let scale = n as f64 / sum;
            for p in &mut next {
                *p = (*p * scale).max(MIN_STRENGTH);
            }
        }

        let max_change = pi
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        pi = next;

        if max_change < tolerance {
            converged = true;
            break;
        }
    }

    let strengths = candidates
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, pi[i]))
        .collect();

    BradleyTerryFit {
        strengths,
        iterations,
        converged,
    }
}
