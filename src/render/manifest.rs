//! File-based control protocol for the rendering host
//!
//! One control file per host session describes what to render and where; the
//! host answers with a beacon file once it is done. The beacon is the source
//! of truth for completion — the host's exit code is advisory only.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::ParameterSet;
use crate::error::RenderError;

/// Name of the control file the host watches for
pub const CONTROL_FILE_NAME: &str = "render_request.json";

/// Name of the completion beacon the host writes
pub const BEACON_FILE_NAME: &str = "render_complete.json";

/// Host workflow requested by a control file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    /// Render every entry of the manifest in one host session
    Batch,
    /// Render a single parameter set (audition)
    Single,
}

/// One render job: a candidate's full parameter set and its output slot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Index of the candidate within its generation
    pub candidate: usize,
    /// Full parameter set to load into the instrument
    pub params: ParameterSet,
    /// Dedicated output directory for this candidate's artifact
    pub slot: PathBuf,
}

/// The control file for one host session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderManifest {
    /// Requested workflow
    pub mode: WorkflowMode,
    /// Opaque session identifier, unique within a run
    pub session_id: String,
    /// Generation this manifest belongs to
    pub generation: usize,
    /// Root directory all slots live under
    pub output_dir: PathBuf,
    /// One entry per candidate
    pub entries: Vec<ManifestEntry>,
}

impl RenderManifest {
    /// Serialize the manifest as the host control file inside `workdir`
    pub fn write_control_file(&self, workdir: &Path) -> Result<PathBuf, RenderError> {
        let path = workdir.join(CONTROL_FILE_NAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RenderError::Protocol(format!("manifest serialization: {e}")))?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Number of render jobs carried
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the manifest has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Completion signal written by the host
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BeaconPayload {
    /// Host-reported status string; `"ok"` means success
    pub status: String,
    /// Optional human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BeaconPayload {
    /// Whether the host reported success
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Parse a beacon file
    pub fn read_from(path: &Path) -> Result<Self, RenderError> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RenderError::Protocol(format!("beacon parse: {e}")))
    }
}

/// Find the artifact the host produced into a slot directory
///
/// Slots are addressed positionally: whatever single file the host wrote into
/// the slot is the candidate's artifact, regardless of how the host named it.
/// An absent or empty slot yields `None`.
pub fn resolve_slot_artifact(slot: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(slot).ok()?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files.into_iter().next()
}
