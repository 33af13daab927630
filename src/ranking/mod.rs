//! Pairwise human-preference ranking
//!
//! When the target is implicit ("make it sound like I want"), fitness comes
//! from a human judging pairs of rendered candidates. This module stores those
//! judgments and derives a per-candidate strength in [0, 1] that the fitness
//! evaluator can minimize against.

pub mod bradley_terry;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RankingError;

use self::bradley_terry::{fit_mm, JudgedPair};

/// Identifier of a candidate within a run
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub usize);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candidate {}", self.0)
    }
}

/// Identifier of a comparison record
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ComparisonId(pub u64);

/// Which side of a pair the human preferred
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    /// The first candidate of the pair
    A,
    /// The second candidate of the pair
    B,
}

/// One pair selected for human judgment
///
/// `preference` and `confidence` start empty and are overwritten when the
/// human answers; the last answer wins. Records are never deleted within a
/// run. Timestamps are a monotonic per-engine sequence, not wall-clock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// Record id
    pub id: ComparisonId,
    /// First candidate of the pair
    pub candidate_a: CandidateId,
    /// Second candidate of the pair
    pub candidate_b: CandidateId,
    /// The judgment, once given
    pub preference: Option<Preference>,
    /// How sure the human was, in [0, 1]
    pub confidence: Option<f64>,
    /// Free-form annotation
    pub notes: Option<String>,
    /// Sequence number at creation
    pub created_at: u64,
    /// Sequence number of the latest update
    pub updated_at: u64,
}

impl ComparisonRecord {
    /// The winner of this comparison, if judged
    pub fn winner(&self) -> Option<CandidateId> {
        match self.preference? {
            Preference::A => Some(self.candidate_a),
            Preference::B => Some(self.candidate_b),
        }
    }

    /// The loser of this comparison, if judged
    pub fn loser(&self) -> Option<CandidateId> {
        match self.preference? {
            Preference::A => Some(self.candidate_b),
            Preference::B => Some(self.candidate_a),
        }
    }
}

/// Derived standing of a candidate in [0, 1]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrengthEstimate {
    /// Candidate this estimate belongs to
    pub candidate_id: CandidateId,
    /// Relative strength in [0, 1]; higher means preferred more often
    pub strength: f64,
    /// Optional 95% interval around the strength
    pub interval: Option<(f64, f64)>,
}

/// How strengths are derived from judged pairs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StrengthModel {
    /// Per-candidate win rate: wins / (wins + losses)
    ///
    /// The minimal fair estimator; ignores opponent strength.
    WinRate,

    /// Bradley-Terry maximum likelihood via the MM algorithm
    ///
    /// Accounts for who beat whom, not just how often.
    BradleyTerry {
        /// Iteration cap for the MM fit
        max_iterations: usize,
        /// Convergence tolerance on parameter change
        tolerance: f64,
    },
}

impl Default for StrengthModel {
    fn default() -> Self {
        Self::WinRate
    }
}

impl StrengthModel {
    /// Default Bradley-Terry configuration
    pub fn bradley_terry() -> Self {
        Self::BradleyTerry {
            max_iterations: 200,
            tolerance: 1e-8,
        }
    }
}

/// Stores pairwise judgments and derives candidate strengths
///
/// Owns all comparison and strength state for one run. Strengths are fully
/// recomputed from the judged record set on every new answer, never patched
/// incrementally, so stale values cannot leak into later generations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PreferenceRankingEngine {
    model: StrengthModel,
    records: Vec<ComparisonRecord>,
    strengths: HashMap<CandidateId, StrengthEstimate>,
    next_record_id: u64,
    clock: u64,
}

impl PreferenceRankingEngine {
    /// Create an engine with the default win-rate model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with an explicit strength model
    pub fn with_model(model: StrengthModel) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// Select every unordered pair of the given candidates for judgment
    ///
    /// Produces n·(n-1)/2 records. Quadratic in the population size; fine for
    /// the handful of top candidates a human can actually audition, a known
    /// scaling limit beyond that.
    pub fn generate_pairs(&mut self, candidates: &[CandidateId]) -> Vec<ComparisonId> {
        let mut ids = Vec::new();
        for (i, &a) in candidates.iter().enumerate() {
            for &b in &candidates[i + 1..] {
                let id = ComparisonId(self.next_record_id);
                self.next_record_id += 1;
                let now = self.tick();
                self.records.push(ComparisonRecord {
                    id,
                    candidate_a: a,
                    candidate_b: b,
                    preference: None,
                    confidence: None,
                    notes: None,
                    created_at: now,
                    updated_at: now,
                });
                ids.push(id);
            }
        }
        debug!(pairs = ids.len(), "comparison pairs generated");
        ids
    }

    /// Record (or overwrite) a human judgment and recompute strengths
    pub fn record_preference(
        &mut self,
        id: ComparisonId,
        preference: Preference,
        confidence: f64,
        notes: Option<String>,
    ) -> Result<(), RankingError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RankingError::InvalidConfidence(confidence));
        }
        let now = self.tick();
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RankingError::ComparisonNotFound(id.0))?;

        record.preference = Some(preference);
        record.confidence = Some(confidence);
        if notes.is_some() {
            record.notes = notes;
        }
        record.updated_at = now;

        self.recompute_strengths();
        Ok(())
    }

    /// The oldest comparison still awaiting an answer, if any
    pub fn next_pending_comparison(&self) -> Option<&ComparisonRecord> {
        self.records.iter().find(|r| r.preference.is_none())
    }

    /// All comparisons still awaiting an answer, oldest first
    pub fn pending_comparisons(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.records.iter().filter(|r| r.preference.is_none())
    }

    /// Every comparison record of the run, oldest first
    pub fn records(&self) -> &[ComparisonRecord] {
        &self.records
    }

    /// Current strength estimate for a candidate
    ///
    /// `None` until the candidate has at least one judged comparison.
    pub fn strength_of(&self, candidate: CandidateId) -> Option<&StrengthEstimate> {
        self.strengths.get(&candidate)
    }

    /// Recompute every strength estimate from the full judged record set
    pub fn recompute_strengths(&mut self) {
        let judged: Vec<JudgedPair> = self
            .records
            .iter()
            .filter_map(|r| {
                Some(JudgedPair {
                    winner: r.winner()?,
                    loser: r.loser()?,
                })
            })
            .collect();

        let compared: BTreeSet<CandidateId> = judged
            .iter()
            .flat_map(|p| [p.winner, p.loser])
            .collect();

        self.strengths = match &self.model {
            StrengthModel::WinRate => Self::win_rate_strengths(&judged, &compared),
            StrengthModel::BradleyTerry {
                max_iterations,
                tolerance,
            } => {
                let candidates: Vec<CandidateId> = compared.iter().copied().collect();
                let fit = fit_mm(&judged, &candidates, *max_iterations, *tolerance);
                fit.strengths
                    .into_iter()
                    .map(|(id, pi)| {
                        // π / (π + 1): the probability of beating an average
                        // (strength 1) opponent, which lands in [0, 1].
                        (
                            id,
                            StrengthEstimate {
                                candidate_id: id,
                                strength: pi / (pi + 1.0),
                                interval: None,
                            },
                        )
                    })
                    .collect()
            }
        };
    }

    fn win_rate_strengths(
        judged: &[JudgedPair],
        compared: &BTreeSet<CandidateId>,
    ) -> HashMap<CandidateId, StrengthEstimate> {
        let mut wins: HashMap<CandidateId, usize> = HashMap::new();
        let mut totals: HashMap<CandidateId, usize> = HashMap::new();
        for pair in judged {
            *wins.entry(pair.winner).or_default() += 1;
            *totals.entry(pair.winner).or_default() += 1;
            *totals.entry(pair.loser).or_default() += 1;
        }

        compared
            .iter()
            .map(|&id| {
                let n = totals.get(&id).copied().unwrap_or(0);
                let w = wins.get(&id).copied().unwrap_or(0);
                let p = if n == 0 { 0.5 } else { w as f64 / n as f64 };
                let interval = if n > 0 {
                    let half = 1.96 * (p * (1.0 - p) / n as f64).sqrt();
                    Some(((p - half).max(0.0), (p + half).min(1.0)))
                } else {
                    None
                };
                (
                    id,
                    StrengthEstimate {
                        candidate_id: id,
                        strength: p,
                        interval,
                    },
                )
            })
            .collect()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

pub mod prelude {
    pub use super::bradley_terry::{BradleyTerryFit, JudgedPair};
    pub use super::{
        CandidateId, ComparisonId, ComparisonRecord, Preference, PreferenceRankingEngine,
        StrengthEstimate, StrengthModel,
    };
}
