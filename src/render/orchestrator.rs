//! Lifecycle management for the external rendering host
//!
//! The host is a stateful desktop application: slow to start, occasionally
//! hung, and impossible to instance. The orchestrator drives exactly one host
//! session from idle to artifacts-on-disk, with unconditional cleanup so a
//! crashed or timed-out session can never poison the next one.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::RenderError;
use crate::render::manifest::{BeaconPayload, RenderManifest, BEACON_FILE_NAME};

/// The host is a single desktop process that cannot be instanced; at most one
/// session may be launching or awaiting completion at a time, system-wide.
static HOST_SESSION: Mutex<()> = Mutex::new(());

fn acquire_host_session() -> MutexGuard<'static, ()> {
    HOST_SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Configuration for launching the rendering host
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Path to the host executable
    pub binary: PathBuf,
    /// Extra arguments passed before the project file
    pub args: Vec<String>,
    /// Instrument project the host must load
    pub project_file: PathBuf,
    /// Working directory holding the control file and beacon
    pub workdir: PathBuf,
    /// How long to wait for the completion beacon
    pub render_timeout: Duration,
    /// How often to poll for the beacon
    pub poll_interval: Duration,
    /// Grace period between SIGTERM and SIGKILL
    pub kill_grace: Duration,
}

impl HostConfig {
    /// Create a config with default timing
    pub fn new(
        binary: impl Into<PathBuf>,
        project_file: impl Into<PathBuf>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            project_file: project_file.into(),
            workdir: workdir.into(),
            render_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(200),
            kill_grace: Duration::from_millis(500),
        }
    }

    /// Set the render timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Set the beacon poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn beacon_path(&self) -> PathBuf {
        self.workdir.join(BEACON_FILE_NAME)
    }
}

/// Host session lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostState {
    /// No session active
    Idle,
    /// Process spawn in progress
    Launching,
    /// Process running, polling for the beacon
    AwaitingCompletion,
    /// Beacon observed with an ok status
    Completed,
    /// Beacon never appeared within the timeout
    TimedOut,
    /// Launch failed or beacon reported an error
    Failed,
}

/// Outcome of waiting for a host session
#[derive(Clone, Debug)]
pub struct CompletionStatus {
    /// Whether the host reported successful completion
    pub success: bool,
    /// Free-form status detail for diagnostics and generation stats
    pub payload: String,
}

/// Drives one external host session at a time
pub struct RenderOrchestrator {
    config: HostConfig,
    state: HostState,
    child: Option<Child>,
    // RAII token for the system-wide host session lock
    _session_guard: Option<MutexGuard<'static, ()>>,
    shutdown: Arc<AtomicBool>,
}

impl RenderOrchestrator {
    /// Create an orchestrator for the given host
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            state: HostState::Idle,
            child: None,
            _session_guard: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> HostState {
        self.state
    }

    /// The host configuration
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Handle that cancels `await_completion` from another thread
    ///
    /// Setting the flag makes the poll loop stop the session and return
    /// failure at the next tick; used on process shutdown.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Start the host bound to a working directory containing the manifest
    ///
    /// Fails immediately if the binary or project file is missing. A launch
    /// failure is fatal for the generation and is not retried here; the
    /// caller decides how to score the affected candidates.
    pub fn launch(&mut self, manifest: &RenderManifest) -> Result<(), RenderError> {
        let guard = acquire_host_session();
        self.state = HostState::Launching;
        // A stale beacon from a previous (killed) session must never be
        // mistaken for this session's completion.
        self.remove_beacon();

        if !self.config.binary.is_file() {
            self.state = HostState::Failed;
            return Err(RenderError::LaunchFailed(format!(
                "host binary not found: {}",
                self.config.binary.display()
            )));
        }
        if !self.config.project_file.is_file() {
            self.state = HostState::Failed;
            return Err(RenderError::LaunchFailed(format!(
                "project file not found: {}",
                self.config.project_file.display()
            )));
        }

        let mut command = Command::new(&self.config.binary);
        command
            .args(&self.config.args)
            .arg(&self.config.project_file)
            .current_dir(&self.config.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group, so a timeout can take down the host together
        // with any helper processes it forked.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        match command.spawn() {
            Ok(child) => {
                info!(
                    session = %manifest.session_id,
                    jobs = manifest.len(),
                    pid = child.id(),
                    "host session launched"
                );
                self.child = Some(child);
                self._session_guard = Some(guard);
                self.state = HostState::AwaitingCompletion;
                Ok(())
            }
            Err(e) => {
                self.state = HostState::Failed;
                Err(RenderError::LaunchFailed(e.to_string()))
            }
        }
    }

    /// Poll for the completion beacon, up to the configured timeout
    ///
    /// On timeout the entire process group is terminated (graceful signal,
    /// then forced kill) so no orphaned host instance survives, and the
    /// beacon is cleared. Neither outcome is retried automatically.
    pub fn await_completion(&mut self) -> CompletionStatus {
        let timeout = self.config.render_timeout;
        let beacon = self.config.beacon_path();
        let deadline = Instant::now() + timeout;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                self.stop();
                return CompletionStatus {
                    success: false,
                    payload: "cancelled by shutdown".to_string(),
                };
            }

            if beacon.is_file() {
                let status = match BeaconPayload::read_from(&beacon) {
                    Ok(payload) => {
                        let success = payload.is_ok();
                        self.state = if success {
                            HostState::Completed
                        } else {
                            HostState::Failed
                        };
                        CompletionStatus {
                            success,
                            payload: payload
                                .message
                                .unwrap_or_else(|| payload.status.clone()),
                        }
                    }
                    Err(e) => {
                        self.state = HostState::Failed;
                        CompletionStatus {
                            success: false,
                            payload: format!("unreadable beacon: {e}"),
                        }
                    }
                };
                self.remove_beacon();
                self.reap_child();
                return status;
            }

            if Instant::now() >= deadline {
                warn!(timeout_secs = timeout.as_secs_f64(), "host session timed out");
                self.terminate_session();
                self.remove_beacon();
                self.state = HostState::TimedOut;
                return CompletionStatus {
                    success: false,
                    payload: format!(
                        "beacon never appeared within {:.1}s",
                        timeout.as_secs_f64()
                    ),
                };
            }

            std::thread::sleep(self.config.poll_interval);
        }
    }

    /// Tear the session down unconditionally
    ///
    /// Safe to call at any time, any number of times, including when nothing
    /// was launched. Kills the host if still running, clears the beacon, and
    /// returns the orchestrator to `Idle`.
    pub fn stop(&mut self) {
        self.terminate_session();
        self.remove_beacon();
        self.state = HostState::Idle;
        self._session_guard = None;
    }

    /// Terminate the spawned process group, if any
    fn terminate_session(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        // Already exited on its own; exit code is advisory only.
        if let Ok(Some(code)) = child.try_wait() {
            debug!(?code, "host exited before termination");
            return;
        }

        #[cfg(unix)]
        {
            let pgid = child.id() as libc::pid_t;
            unsafe {
                libc::killpg(pgid, libc::SIGTERM);
            }
            let grace_deadline = Instant::now() + self.config.kill_grace;
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => return,
                    Ok(None) if Instant::now() < grace_deadline => {
                        std::thread::sleep(Duration::from_millis(20));
                    }
                    _ => break,
                }
            }
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = child.kill();
        }

        let _ = child.wait();
        debug!("host process group terminated");
    }

    /// Collect the exit status of a host that finished by itself
    fn reap_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            match child.wait() {
                Ok(code) => debug!(?code, "host exited"),
                Err(e) => warn!(error = %e, "failed to reap host process"),
            }
        }
        self._session_guard = None;
    }

    /// Delete the beacon file; absence is not an error
    fn remove_beacon(&self) {
        match std::fs::remove_file(self.config.beacon_path()) {
            Ok(()) => debug!("beacon cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "could not remove beacon"),
        }
    }
}

impl Drop for RenderOrchestrator {
    fn drop(&mut self) {
        // Guaranteed-cleanup path: a panic or early return between launch and
        // stop must not leave a host process or a stale beacon behind.
        self.stop();
    }
}
