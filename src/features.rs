//! Audio feature targets and the extraction collaborator
//!
//! Feature extraction itself is an external collaborator: the crate only sees
//! `extract(path, features) -> map<feature, value>`. This module carries the
//! target profile (which features matter, with what weight, toward what
//! values) and the weighted distance that turns an extracted vector into a
//! scalar objective.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Error raised by a feature extractor
///
/// Extractors must tolerate silent or degenerate audio (returning zero or
/// near-zero values), so the only legitimate failure is an unreadable or
/// empty artifact.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ExtractionError {
    /// The artifact does not exist or cannot be read
    #[error("Artifact not readable: {0}")]
    Unreadable(String),

    /// The artifact exists but holds no audio
    #[error("Artifact is empty: {0}")]
    Empty(String),
}

/// Feature extraction collaborator
///
/// Implementations must be deterministic for identical input.
pub trait FeatureExtractor: Send + Sync {
    /// Extract the named features from an audio artifact
    fn extract(
        &self,
        artifact: &Path,
        features: &[String],
    ) -> Result<BTreeMap<String, f64>, ExtractionError>;
}

/// What the evolved audio should sound like, numerically
///
/// A feature is active iff its weight is non-zero; only active features are
/// extracted and compared.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Per-feature weights; zero-weight entries are inert
    pub weights: BTreeMap<String, f64>,
    /// Target value per feature; features without a target compare against 0
    pub target: BTreeMap<String, f64>,
}

impl TargetProfile {
    /// Create a profile from (feature, weight, target) triples
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64, f64)>,
        S: Into<String>,
    {
        let mut weights = BTreeMap::new();
        let mut target = BTreeMap::new();
        for (name, weight, value) in entries {
            let name = name.into();
            weights.insert(name.clone(), weight);
            target.insert(name, value);
        }
        Self { weights, target }
    }

    /// Names of features with a non-zero weight, in stable order
    pub fn active_features(&self) -> Vec<String> {
        self.weights
            .iter()
            .filter(|(_, &w)| w != 0.0)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Fail fast if nothing is active; called before any rendering starts
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.active_features().is_empty() {
            return Err(ValidationError::NoActiveFeatures);
        }
        Ok(())
    }

    /// Weighted Euclidean distance from an extracted feature vector to the target
    ///
    /// Only active features contribute. A feature the extractor did not
    /// return compares as zero, matching the degenerate-audio convention.
    pub fn distance(&self, extracted: &BTreeMap<String, f64>) -> f64 {
        self.weights
            .iter()
            .filter(|(_, &w)| w != 0.0)
            .map(|(name, &w)| {
                let value = extracted.get(name).copied().unwrap_or(0.0);
                let target = self.target.get(name).copied().unwrap_or(0.0);
                w * (value - target).powi(2)
            })
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_features_skips_zero_weight() {
        let profile = TargetProfile::new(vec![
            ("centroid", 1.0, 0.5),
            ("rms", 0.0, 0.2),
            ("flux", 2.0, 0.0),
        ]);
        assert_eq!(profile.active_features(), vec!["centroid", "flux"]);
    }

    #[test]
    fn test_validate_no_active_features() {
        let profile = TargetProfile::new(vec![("rms", 0.0, 0.2)]);
        assert_eq!(profile.validate(), Err(ValidationError::NoActiveFeatures));

        let empty = TargetProfile::default();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_distance_weighted_euclidean() {
        let profile = TargetProfile::new(vec![("a", 1.0, 0.0), ("b", 4.0, 0.0)]);
        let mut extracted = BTreeMap::new();
        extracted.insert("a".to_string(), 3.0);
        extracted.insert("b".to_string(), 2.0);

        // sqrt(1*9 + 4*4) = 5
        assert!((profile.distance(&extracted) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_missing_feature_compares_as_zero() {
        let profile = TargetProfile::new(vec![("a", 1.0, 2.0)]);
        let extracted = BTreeMap::new();
        assert!((profile.distance(&extracted) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_ignores_inactive_features() {
        let profile = TargetProfile::new(vec![("a", 1.0, 0.0), ("b", 0.0, 100.0)]);
        let mut extracted = BTreeMap::new();
        extracted.insert("a".to_string(), 1.0);
        extracted.insert("b".to_string(), 50.0);

        assert!((profile.distance(&extracted) - 1.0).abs() < 1e-12);
    }
}
