//! Instrument parameter catalog
//!
//! The catalog is the static table of every control parameter the rendering
//! host understands: its id, global value range, and default. It is built and
//! validated once, then shared read-only for the lifetime of a run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of a single instrument parameter
///
/// Interned as an `Arc<str>` so ids can be copied freely between the catalog,
/// constraint sets, parameter sets and manifests without reallocating.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamId(Arc<str>);

impl ParamId {
    /// Create a new parameter id
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParamId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Range and default of one catalog parameter
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Global lower bound (inclusive)
    pub min: f64,
    /// Global upper bound (inclusive)
    pub max: f64,
    /// Value used when a parameter is left unconstrained
    pub default: f64,
}

impl ParamSpec {
    /// Check whether a value lies within the global range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A full assignment of values to parameters
///
/// Keys iterate in id order, which keeps every serialization of the same
/// assignment byte-identical.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<ParamId, f64>);

impl ParameterSet {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parameters carried
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the value of a parameter, if present
    pub fn get(&self, id: &ParamId) -> Option<f64> {
        self.0.get(id).copied()
    }

    /// Set the value of a parameter
    pub fn set(&mut self, id: ParamId, value: f64) {
        self.0.insert(id, value);
    }

    /// Iterate over (id, value) pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (&ParamId, f64)> {
        self.0.iter().map(|(id, v)| (id, *v))
    }
}

impl FromIterator<(ParamId, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (ParamId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The static table of all host parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterCatalog {
    entries: BTreeMap<ParamId, ParamSpec>,
}

impl ParameterCatalog {
    /// Build a catalog from (id, spec) pairs, validating each spec once
    pub fn new<I>(entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (ParamId, ParamSpec)>,
    {
        let mut table = BTreeMap::new();
        for (id, spec) in entries {
            if spec.min > spec.max || !spec.contains(spec.default) {
                return Err(ValidationError::InvalidBounds {
                    id,
                    min: spec.min,
                    max: spec.max,
                });
            }
            table.insert(id, spec);
        }
        Ok(Self { entries: table })
    }

    /// Look up a parameter's spec
    pub fn spec(&self, id: &ParamId) -> Option<&ParamSpec> {
        self.entries.get(id)
    }

    /// Check whether the catalog knows an id
    pub fn contains(&self, id: &ParamId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of parameters in the catalog
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in id order
    pub fn iter(&self) -> impl Iterator<Item = (&ParamId, &ParamSpec)> {
        self.entries.iter()
    }

    /// A full parameter set holding every parameter's default
    pub fn defaults(&self) -> ParameterSet {
        self.entries
            .iter()
            .map(|(id, spec)| (id.clone(), spec.default))
            .collect()
    }
}
