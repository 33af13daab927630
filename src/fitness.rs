//! Turning rendered artifacts into a scalar objective
//!
//! Two interchangeable strategies, selected by how the target is expressed:
//! a numeric target profile scores artifacts by weighted feature distance; an
//! implicit target scores candidates from human preference strengths. Both
//! minimize: lower is fitter.
//!
//! Individual-level problems (missing artifact, extraction failure) never
//! escape this module. They become penalty scores, so the objective vector
//! handed to selection is always fully populated and free of NaN.

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use tracing::warn;

use crate::error::ValidationError;
use crate::features::{FeatureExtractor, TargetProfile};
use crate::ranking::{CandidateId, PreferenceRankingEngine};

/// Large finite sentinel for unrenderable or unscorable candidates
///
/// Finite so the objective vector stays sortable.
pub const PENALTY_FITNESS: f64 = 1e9;

/// Score for a candidate no human has judged yet
///
/// Absence of judgments is not evidence of poor quality, so unjudged
/// candidates sit in the middle rather than at the bottom.
pub const NEUTRAL_FITNESS: f64 = 0.5;

enum Strategy {
    Distance {
        extractor: Arc<dyn FeatureExtractor>,
        profile: TargetProfile,
        active: Vec<String>,
    },
    Preference,
}

/// Converts one generation's artifacts into fitness values
pub struct FitnessEvaluator {
    strategy: Strategy,
}

impl FitnessEvaluator {
    /// Score by weighted feature distance to a numeric target
    ///
    /// Fails fast if the profile has no active features, before any
    /// rendering is attempted.
    pub fn distance(
        extractor: Arc<dyn FeatureExtractor>,
        profile: TargetProfile,
    ) -> Result<Self, ValidationError> {
        profile.validate()?;
        let active = profile.active_features();
        Ok(Self {
            strategy: Strategy::Distance {
                extractor,
                profile,
                active,
            },
        })
    }

    /// Score from pairwise human preference strengths
    pub fn preference() -> Self {
        Self {
            strategy: Strategy::Preference,
        }
    }

    /// Whether this evaluator needs human judgments to make progress
    pub fn is_preference(&self) -> bool {
        matches!(self.strategy, Strategy::Preference)
    }

    /// Score every candidate of a generation
    ///
    /// `artifacts` holds one entry per candidate in population order, `None`
    /// for anything the render batch failed to produce. `ranking` supplies
    /// strengths in preference mode and is ignored in distance mode. The
    /// returned vector always has one finite entry per candidate.
    pub fn score_generation(
        &self,
        candidates: &[CandidateId],
        artifacts: &[Option<PathBuf>],
        ranking: Option<&PreferenceRankingEngine>,
    ) -> Vec<f64> {
        match &self.strategy {
            Strategy::Distance { .. } => self.score_by_distance(artifacts),
            Strategy::Preference => candidates
                .iter()
                .map(|&id| {
                    let strength = ranking
                        .and_then(|engine| engine.strength_of(id))
                        .map(|e| e.strength);
                    match strength {
                        // Minimization convention: preferred candidates score low
                        Some(s) => 1.0 - s,
                        None => NEUTRAL_FITNESS,
                    }
                })
                .collect(),
        }
    }

    #[cfg(feature = "parallel")]
    fn score_by_distance(&self, artifacts: &[Option<PathBuf>]) -> Vec<f64> {
        // Extraction is CPU-bound and independent per candidate; run it on
        // the worker pool once the (strictly sequential) render is done.
        artifacts
            .par_iter()
            .map(|artifact| self.score_artifact(artifact.as_deref()))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn score_by_distance(&self, artifacts: &[Option<PathBuf>]) -> Vec<f64> {
        artifacts
            .iter()
            .map(|artifact| self.score_artifact(artifact.as_deref()))
            .collect()
    }

    fn score_artifact(&self, artifact: Option<&Path>) -> f64 {
        let Strategy::Distance {
            extractor,
            profile,
            active,
        } = &self.strategy
        else {
            unreachable!("score_artifact is only called in distance mode");
        };

        let Some(path) = artifact else {
            return PENALTY_FITNESS;
        };

        match extractor.extract(path, active) {
            Ok(extracted) => {
                let d = profile.distance(&extracted);
                if d.is_finite() {
                    d
                } else {
                    warn!(artifact = %path.display(), "non-finite distance, scoring as penalty");
                    PENALTY_FITNESS
                }
            }
            Err(e) => {
                warn!(artifact = %path.display(), error = %e, "feature extraction failed");
                PENALTY_FITNESS
            }
        }
    }
}
