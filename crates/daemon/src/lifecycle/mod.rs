// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use kx_adapters::{AnalysisError, ChatAnalysisAdapter, KubeConnector, VclusterShadowAdapter};
use kx_storage::{AuditError, StoreError, DEFAULT_KEY_BITS};
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::listener::ListenCtx;
use crate::settings::SettingsError;

/// Listener context with the production adapters
pub type DaemonCtx = ListenCtx<VclusterShadowAdapter, ChatAnalysisAdapter, KubeConnector>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/kortex)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    pub settings_path: PathBuf,
    pub sessions_path: PathBuf,
    pub snapshots_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub audit_key_path: PathBuf,
    pub audit_public_key_path: PathBuf,
    /// Shadow environment connection descriptors
    pub shadows_path: PathBuf,
    /// RSA modulus size used when generating a fresh audit key
    pub audit_key_bits: usize,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `~/.local/state/kortex/` (or `$XDG_STATE_HOME/kortex/`).
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::at(crate::env::state_dir()?))
    }

    /// Derive every path from an explicit state directory.
    pub fn at(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            settings_path: state_dir.join("settings.toml"),
            sessions_path: state_dir.join("scans.json"),
            snapshots_path: state_dir.join("snapshots.json"),
            audit_log_path: state_dir.join("audit.jsonl"),
            audit_key_path: state_dir.join("audit_key.pem"),
            audit_public_key_path: state_dir.join("audit_key.pub.pem"),
            shadows_path: state_dir.join("shadows"),
            audit_key_bits: DEFAULT_KEY_BITS,
            state_dir,
        }
    }
}

/// Daemon state during operation.
///
/// The listener is returned separately from startup to be spawned as a Listener task.
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Services shared with the listener
    pub ctx: Arc<DaemonCtx>,
    /// When daemon started
    pub start_time: Instant,
}

/// Result of daemon startup - includes both the daemon state and the listener.
pub struct StartupResult {
    pub daemon: DaemonState,
    /// The Unix socket listener to spawn as a task
    pub listener: UnixListener,
}

impl DaemonState {
    /// Signalled by a `Shutdown` request.
    pub fn shutdown_notify(&self) -> Arc<Notify> {
        Arc::clone(&self.ctx.shutdown)
    }

    /// Shutdown the daemon gracefully.
    ///
    /// In-flight workflows are interrupted and each destroys its shadow
    /// environment before this returns. Running scans are abandoned with the
    /// process; they are persisted after every batch, so the next startup
    /// finds them non-terminal and marks them failed.
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!(uptime_secs = self.start_time.elapsed().as_secs(), "Shutting down daemon...");

        // 1. Tear down shadow environments of in-flight workflows
        self.ctx.orchestrator.shutdown().await;

        // 2. Remove socket file (listener task stops when tokio runtime exits)
        remove_if_exists(&self.config.socket_path, "socket");

        // 3. Remove PID file
        remove_if_exists(&self.config.lock_path, "PID");

        // 4. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

fn remove_if_exists(path: &Path, what: &str) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {} file: {}", what, e);
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Scan store error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("AI backend setup failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
