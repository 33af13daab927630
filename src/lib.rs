//! # synth-evo
//!
//! Batched evolutionary matching of synthesizer parameters.
//!
//! The crate evolves control-parameter sets for an external audio rendering
//! host so that the rendered output approaches either a numeric
//! audio-feature target or an implicit target expressed through pairwise
//! human preferences.
//!
//! ## Core pipeline
//!
//! - **Codec**: a sparse constraint set maps to a dense fixed-order genome
//! - **Render**: a whole generation renders in one host session, driven over
//!   a file-based control/beacon protocol
//! - **Score**: artifacts become scalar fitness by weighted feature distance
//!   or by preference-derived strength (lower is better throughout)
//! - **Vary**: injected selection/crossover/mutation produce the next
//!   generation, re-clamped to bounds
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use synth_evo::prelude::*;
//! use rand::SeedableRng;
//! use std::sync::Arc;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let codec = GenomeCodec::new(&catalog, constraints);
//! let evaluator = FitnessEvaluator::distance(Arc::new(extractor), profile)?;
//! let mut session = BatchRenderSession::new(host_config, "renders", "run-0");
//!
//! let driver = EvolutionDriver::new(
//!     EvolutionConfig::default(),
//!     TournamentSelection::new(3),
//!     SbxCrossover::new(15.0),
//!     GaussianMutation::new(0.1),
//! )?;
//! let report = driver.run(
//!     RunContext {
//!         codec: &codec,
//!         renderer: &mut session,
//!         evaluator: &evaluator,
//!         ranking: None,
//!     },
//!     &mut rng,
//! )?;
//! ```

pub mod catalog;
pub mod driver;
pub mod error;
pub mod features;
pub mod fitness;
pub mod genome;
pub mod operators;
pub mod ranking;
pub mod render;
pub mod storage;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::catalog::{ParamId, ParamSpec, ParameterCatalog, ParameterSet};
    pub use crate::driver::{
        Candidate, ConvergenceCheck, EvolutionConfig, EvolutionDriver, EvolutionReport,
        GenerationStats, RunContext, RunOutcome,
    };
    pub use crate::error::*;
    pub use crate::features::{ExtractionError, FeatureExtractor, TargetProfile};
    pub use crate::fitness::{FitnessEvaluator, NEUTRAL_FITNESS, PENALTY_FITNESS};
    pub use crate::genome::prelude::*;
    pub use crate::operators::prelude::*;
    pub use crate::ranking::prelude::*;
    pub use crate::render::prelude::*;
    pub use crate::storage::{ArtifactStore, FsArtifactStore};
}
