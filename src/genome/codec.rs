//! Constraint sets and the genome codec
//!
//! The codec maps between a sparse user-chosen constraint set and the dense
//! fixed-order gene vector the evolutionary machinery works on. It is a pure
//! bijection modulo the default-overlay: bounds enforcement is the operators'
//! job, not the codec's.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{ParamId, ParameterCatalog, ParameterSet};
use crate::error::ValidationError;
use crate::genome::bounds::{Bounds, MultiBounds};
use crate::genome::Genome;

/// A user-imposed search range for one parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterConstraint {
    /// Which parameter is constrained
    pub id: ParamId,
    /// Search lower bound (inclusive)
    pub min: f64,
    /// Search upper bound (inclusive)
    pub max: f64,
}

impl ParameterConstraint {
    /// Create a new constraint
    pub fn new(id: impl Into<ParamId>, min: f64, max: f64) -> Self {
        Self {
            id: id.into(),
            min,
            max,
        }
    }
}

/// The validated set of constraints for one evolution run
///
/// Constraints iterate in catalog (id) order; that order fixes the gene order
/// of every genome in the run. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    constraints: Vec<ParameterConstraint>,
}

impl ConstraintSet {
    /// Validate constraints against the catalog and fix their order
    ///
    /// Fails if the set is empty, an id is unknown, a range is inverted, or a
    /// range escapes the catalog's global bounds for that id.
    pub fn new(
        catalog: &ParameterCatalog,
        constraints: Vec<ParameterConstraint>,
    ) -> Result<Self, ValidationError> {
        if constraints.is_empty() {
            return Err(ValidationError::EmptyConstraintSet);
        }

        let mut validated = Vec::with_capacity(constraints.len());
        for c in constraints {
            let spec = catalog
                .spec(&c.id)
                .ok_or_else(|| ValidationError::UnknownParameter(c.id.clone()))?;
            if c.min > c.max {
                return Err(ValidationError::InvalidBounds {
                    id: c.id,
                    min: c.min,
                    max: c.max,
                });
            }
            if c.min < spec.min || c.max > spec.max {
                return Err(ValidationError::ConstraintOutOfRange {
                    id: c.id,
                    min: c.min,
                    max: c.max,
                    cat_min: spec.min,
                    cat_max: spec.max,
                });
            }
            validated.push(c);
        }
        validated.sort_by(|a, b| a.id.cmp(&b.id));
        validated.dedup_by(|a, b| a.id == b.id);

        Ok(Self {
            constraints: validated,
        })
    }

    /// Number of constrained parameters (= genome length)
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Check if the set is empty (cannot happen for a validated set)
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Iterate constraints in gene order
    pub fn iter(&self) -> impl Iterator<Item = &ParameterConstraint> {
        self.constraints.iter()
    }
}

/// Bidirectional mapping between parameter sets and genomes
#[derive(Clone, Debug)]
pub struct GenomeCodec {
    defaults: ParameterSet,
    constraints: ConstraintSet,
    bounds: MultiBounds,
}

impl GenomeCodec {
    /// Build a codec for one run from the catalog and a validated constraint set
    pub fn new(catalog: &ParameterCatalog, constraints: ConstraintSet) -> Self {
        let bounds = constraints
            .iter()
            .map(|c| Bounds::new(c.min, c.max))
            .collect();
        Self {
            defaults: catalog.defaults(),
            constraints,
            bounds,
        }
    }

    /// Per-gene search bounds, in gene order
    pub fn bounds(&self) -> &MultiBounds {
        &self.bounds
    }

    /// The constraint set this codec was built from
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Genome length for this run
    pub fn genome_len(&self) -> usize {
        self.constraints.len()
    }

    /// Extract a genome from a full (or partial) parameter set
    ///
    /// Constrained ids are copied in gene order; unconstrained ids are
    /// ignored. A constrained id missing from the input falls back to the
    /// center of its search range, with a warning rather than a hard failure,
    /// so partially-specified presets remain usable as seeds.
    pub fn encode(&self, params: &ParameterSet) -> Genome {
        let genes = self
            .constraints
            .iter()
            .zip(self.bounds.bounds.iter())
            .map(|(c, b)| match params.get(&c.id) {
                Some(value) => value,
                None => {
                    warn!(param = %c.id, fallback = b.center(), "parameter missing from input, using range center");
                    b.center()
                }
            })
            .collect();
        Genome::new(genes)
    }

    /// Materialize a full parameter set from a genome
    ///
    /// Starts from catalog defaults and overlays genome values positionally.
    pub fn decode(&self, genome: &Genome) -> Result<ParameterSet, ValidationError> {
        if genome.len() != self.constraints.len() {
            return Err(ValidationError::ShapeMismatch {
                expected: self.constraints.len(),
                actual: genome.len(),
            });
        }

        let mut params = self.defaults.clone();
        for (c, &gene) in self.constraints.iter().zip(genome.genes()) {
            params.set(c.id.clone(), gene);
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParamSpec;

    fn catalog() -> ParameterCatalog {
        ParameterCatalog::new(vec![
            (
                ParamId::new("cutoff"),
                ParamSpec {
                    min: 0.0,
                    max: 1.0,
                    default: 0.5,
                },
            ),
            (
                ParamId::new("detune"),
                ParamSpec {
                    min: -1.0,
                    max: 1.0,
                    default: 0.0,
                },
            ),
            (
                ParamId::new("resonance"),
                ParamSpec {
                    min: 0.0,
                    max: 1.0,
                    default: 0.1,
                },
            ),
        ])
        .unwrap()
    }

    fn codec() -> GenomeCodec {
        let cat = catalog();
        let constraints = ConstraintSet::new(
            &cat,
            vec![
                ParameterConstraint::new("detune", -0.5, 0.5),
                ParameterConstraint::new("cutoff", 0.2, 0.8),
            ],
        )
        .unwrap();
        GenomeCodec::new(&cat, constraints)
    }

    #[test]
    fn test_constraint_set_empty_rejected() {
        let result = ConstraintSet::new(&catalog(), vec![]);
        assert_eq!(result, Err(ValidationError::EmptyConstraintSet));
    }

    #[test]
    fn test_constraint_set_unknown_parameter() {
        let result = ConstraintSet::new(
            &catalog(),
            vec![ParameterConstraint::new("wobble", 0.0, 1.0)],
        );
        assert!(matches!(
            result,
            Err(ValidationError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_constraint_set_out_of_catalog_range() {
        let result = ConstraintSet::new(
            &catalog(),
            vec![ParameterConstraint::new("cutoff", 0.0, 2.0)],
        );
        assert!(matches!(
            result,
            Err(ValidationError::ConstraintOutOfRange { .. })
        ));
    }

    #[test]
    fn test_constraint_set_orders_by_id() {
        let cat = catalog();
        let set = ConstraintSet::new(
            &cat,
            vec![
                ParameterConstraint::new("resonance", 0.0, 1.0),
                ParameterConstraint::new("cutoff", 0.2, 0.8),
            ],
        )
        .unwrap();

        let ids: Vec<&str> = set.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["cutoff", "resonance"]);
    }

    #[test]
    fn test_encode_copies_constrained_in_order() {
        let codec = codec();
        let mut params = ParameterSet::new();
        params.set(ParamId::new("cutoff"), 0.3);
        params.set(ParamId::new("detune"), -0.2);
        params.set(ParamId::new("resonance"), 0.9); // unconstrained, ignored

        let genome = codec.encode(&params);
        // Gene order is id order: cutoff, detune
        assert_eq!(genome.genes(), &[0.3, -0.2]);
    }

    #[test]
    fn test_encode_missing_id_falls_back_to_center() {
        let codec = codec();
        let mut params = ParameterSet::new();
        params.set(ParamId::new("cutoff"), 0.3);
        // detune absent: center of [-0.5, 0.5] is 0.0

        let genome = codec.encode(&params);
        assert_eq!(genome.genes(), &[0.3, 0.0]);
    }

    #[test]
    fn test_decode_overlays_defaults() {
        let codec = codec();
        let genome = Genome::new(vec![0.25, 0.4]);

        let params = codec.decode(&genome).unwrap();
        assert_eq!(params.get(&ParamId::new("cutoff")), Some(0.25));
        assert_eq!(params.get(&ParamId::new("detune")), Some(0.4));
        // Unconstrained parameter keeps its catalog default
        assert_eq!(params.get(&ParamId::new("resonance")), Some(0.1));
    }

    #[test]
    fn test_decode_wrong_shape() {
        let codec = codec();
        let result = codec.decode(&Genome::new(vec![0.5]));
        assert_eq!(
            result,
            Err(ValidationError::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_round_trip_restricted_to_constrained_ids() {
        let codec = codec();
        let mut params = ParameterSet::new();
        params.set(ParamId::new("cutoff"), 0.6);
        params.set(ParamId::new("detune"), 0.1);

        let decoded = codec.decode(&codec.encode(&params)).unwrap();
        assert_eq!(decoded.get(&ParamId::new("cutoff")), Some(0.6));
        assert_eq!(decoded.get(&ParamId::new("detune")), Some(0.1));
    }
}
