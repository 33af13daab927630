//! Batched rendering of a whole generation
//!
//! Launching the host is expensive, so a generation's population is rendered
//! in a single host session: one manifest, one launch, one beacon. Artifacts
//! are reconciled back to individuals positionally by slot.

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::catalog::ParameterSet;
use crate::error::RenderError;
use crate::render::manifest::{
    resolve_slot_artifact, ManifestEntry, RenderManifest, WorkflowMode,
};
use crate::render::orchestrator::{HostConfig, RenderOrchestrator};

/// Result of rendering one generation
#[derive(Clone, Debug)]
pub struct BatchOutcome {
    /// Whether the host session completed successfully
    pub success: bool,
    /// Free-form status detail (launch error, timeout, beacon message)
    pub status: String,
    /// One artifact path per individual, in population order; `None` for any
    /// individual whose slot stayed empty
    pub artifacts: Vec<Option<PathBuf>>,
}

impl BatchOutcome {
    /// A batch that failed before producing anything
    pub fn failed(status: impl Into<String>, population_size: usize) -> Self {
        Self {
            success: false,
            status: status.into(),
            artifacts: vec![None; population_size],
        }
    }
}

/// Seam between the evolutionary loop and the rendering machinery
///
/// The driver only needs "turn a population into artifacts"; tests substitute
/// a stub so the loop runs without a desktop host.
pub trait RenderBackend {
    /// Render every parameter set of a generation and reconcile artifacts
    fn render_generation(
        &mut self,
        generation: usize,
        population: &[ParameterSet],
    ) -> BatchOutcome;
}

/// Renders an entire generation through one host session
pub struct BatchRenderSession {
    orchestrator: RenderOrchestrator,
    output_root: PathBuf,
    run_id: String,
}

impl BatchRenderSession {
    /// Create a session manager for a run
    ///
    /// `output_root` receives one `gen_NNN/` directory per generation, each
    /// holding one `slot_NNN/` directory per individual.
    pub fn new(config: HostConfig, output_root: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            orchestrator: RenderOrchestrator::new(config),
            output_root: output_root.into(),
            run_id: run_id.into(),
        }
    }

    /// Access the orchestrator (e.g. for its shutdown handle)
    pub fn orchestrator(&self) -> &RenderOrchestrator {
        &self.orchestrator
    }

    /// Build the manifest for a generation, allocating one slot per individual
    pub fn create_session(
        &self,
        generation: usize,
        population: &[ParameterSet],
    ) -> Result<RenderManifest, RenderError> {
        let output_dir = self.output_root.join(format!("gen_{generation:03}"));
        let mut entries = Vec::with_capacity(population.len());
        for (index, params) in population.iter().enumerate() {
            let slot = output_dir.join(format!("slot_{index:03}"));
            fs::create_dir_all(&slot)?;
            entries.push(ManifestEntry {
                candidate: index,
                params: params.clone(),
                slot,
            });
        }

        Ok(RenderManifest {
            mode: WorkflowMode::Batch,
            session_id: format!("{}-gen-{generation}", self.run_id),
            generation,
            output_dir,
            entries,
        })
    }

    /// Build a single-render manifest, for auditioning one candidate
    pub fn create_single(
        &self,
        label: &str,
        params: &ParameterSet,
    ) -> Result<RenderManifest, RenderError> {
        let slot = self.output_root.join("audition").join(label);
        fs::create_dir_all(&slot)?;
        Ok(RenderManifest {
            mode: WorkflowMode::Single,
            session_id: format!("{}-audition-{label}", self.run_id),
            generation: 0,
            output_dir: slot.clone(),
            entries: vec![ManifestEntry {
                candidate: 0,
                params: params.clone(),
                slot,
            }],
        })
    }

    /// Run one host session for the manifest and reconcile artifacts
    ///
    /// A launch failure or timeout invalidates the whole batch (every slot
    /// `None`); a single empty slot only blanks that individual. The
    /// orchestrator is stopped on every path, so no outcome leaves a host
    /// process or beacon behind.
    pub fn execute(&mut self, manifest: &RenderManifest) -> BatchOutcome {
        let size = manifest.len();

        if let Err(e) = manifest.write_control_file(&self.orchestrator.config().workdir) {
            self.orchestrator.stop();
            return BatchOutcome::failed(e.to_string(), size);
        }

        let outcome = match self.orchestrator.launch(manifest) {
            Err(e) => {
                warn!(session = %manifest.session_id, error = %e, "batch launch failed");
                BatchOutcome::failed(e.to_string(), size)
            }
            Ok(()) => {
                let completion = self.orchestrator.await_completion();
                if completion.success {
                    let artifacts = self.reconcile(manifest);
                    let rendered = artifacts.iter().filter(|a| a.is_some()).count();
                    info!(
                        session = %manifest.session_id,
                        rendered,
                        expected = size,
                        "batch session completed"
                    );
                    BatchOutcome {
                        success: true,
                        status: completion.payload,
                        artifacts,
                    }
                } else {
                    warn!(
                        session = %manifest.session_id,
                        status = %completion.payload,
                        "batch session did not complete"
                    );
                    BatchOutcome::failed(completion.payload, size)
                }
            }
        };

        // Unconditional cleanup, success or not.
        self.orchestrator.stop();
        outcome
    }

    /// Map slot directories back to individuals, positionally
    fn reconcile(&self, manifest: &RenderManifest) -> Vec<Option<PathBuf>> {
        manifest
            .entries
            .iter()
            .map(|entry| {
                let artifact = resolve_slot_artifact(&entry.slot);
                if artifact.is_none() {
                    warn!(
                        candidate = entry.candidate,
                        slot = %entry.slot.display(),
                        "slot produced no artifact"
                    );
                }
                artifact
            })
            .collect()
    }
}

impl RenderBackend for BatchRenderSession {
    fn render_generation(
        &mut self,
        generation: usize,
        population: &[ParameterSet],
    ) -> BatchOutcome {
        let manifest = match self.create_session(generation, population) {
            Ok(m) => m,
            Err(e) => return BatchOutcome::failed(e.to_string(), population.len()),
        };
        self.execute(&manifest)
    }
}
