//! Error types for synth-evo
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

use crate::catalog::ParamId;

/// Error type for invalid inputs: bad constraint sets, malformed genomes,
/// empty target profiles. These are the caller's fault and are never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The constraint set has no entries
    #[error("Constraint set is empty")]
    EmptyConstraintSet,

    /// A constraint range is inverted
    #[error("Invalid bounds for {id}: min ({min}) must be <= max ({max})")]
    InvalidBounds { id: ParamId, min: f64, max: f64 },

    /// A constraint names a parameter the catalog does not know
    #[error("Unknown parameter: {0}")]
    UnknownParameter(ParamId),

    /// A constraint range escapes the catalog's global bounds
    #[error("Constraint for {id} ([{min}, {max}]) exceeds catalog range [{cat_min}, {cat_max}]")]
    ConstraintOutOfRange {
        id: ParamId,
        min: f64,
        max: f64,
        cat_min: f64,
        cat_max: f64,
    },

    /// Genome length does not match the constraint set
    #[error("Genome shape mismatch: expected {expected} genes, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A target profile with no non-zero feature weights
    #[error("Target profile has no active features")]
    NoActiveFeatures,
}

/// Error type for the external rendering host
#[derive(Debug, Error)]
pub enum RenderError {
    /// The host process could not be started. Fatal for the generation,
    /// never retried; the run continues.
    #[error("Host launch failed: {0}")]
    LaunchFailed(String),

    /// The completion beacon never appeared within the timeout
    #[error("Host timed out after {timeout_secs:.1}s: {detail}")]
    TimedOut { timeout_secs: f64, detail: String },

    /// IO error while driving the control protocol
    #[error("Render IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Control file or beacon could not be serialized/deserialized
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Error type for the preference ranking engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RankingError {
    /// No comparison with the given id exists
    #[error("Comparison not found: {0}")]
    ComparisonNotFound(u64),

    /// Confidence outside [0, 1]
    #[error("Confidence {0} outside [0, 1]")]
    InvalidConfidence(f64),
}

/// Top-level error type for evolution runs
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Render error that escaped generation-level handling
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Ranking error
    #[error("Ranking error: {0}")]
    Ranking(#[from] RankingError),

    /// Invalid driver configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Empty population
    #[error("Empty population")]
    EmptyPopulation,

    /// Too many generation-fatal failures in a row
    #[error("{0} consecutive generation failures, aborting run")]
    ConsecutiveFailures(usize),
}

/// Result type alias for evolution operations
pub type EvoResult<T> = Result<T, EvolutionError>;
