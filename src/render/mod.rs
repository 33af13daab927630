//! Driving the external rendering host
//!
//! The host is controlled entirely through files: a control file describing
//! the render jobs, and a beacon file it writes on completion. `orchestrator`
//! owns the process lifecycle, `manifest` the protocol types, and `session`
//! amortizes host startup by rendering a whole generation per launch.

pub mod manifest;
pub mod orchestrator;
pub mod session;

pub mod prelude {
    pub use super::manifest::{BeaconPayload, ManifestEntry, RenderManifest, WorkflowMode};
    pub use super::orchestrator::{CompletionStatus, HostConfig, HostState, RenderOrchestrator};
    pub use super::session::{BatchOutcome, BatchRenderSession, RenderBackend};
}
