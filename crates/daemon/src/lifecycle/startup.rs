// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use kx_adapters::{ChatAnalysisAdapter, KubeConnector, ShadowConfig, VclusterShadowAdapter};
use kx_core::{Clock, SystemClock};
use kx_engine::{
    connect_cluster, AuditSink, ChainAuditSink, ClusterRegistry, Orchestrator, OrchestratorConfig,
    Registry, ScanDeps, ScanEngine, WorkflowDeps,
};
use kx_storage::{recover_interrupted, AuditChain, AuditKeys, ScanStore};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use super::{Config, DaemonState, LifecycleError, StartupResult};
use crate::env;
use crate::listener::ListenCtx;
use crate::settings::Settings;

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock:
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create state directory (needed for socket, lock, etc.)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Open without truncating so a running daemon's PID survives a failed attempt.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Create directories
    std::fs::create_dir_all(&config.shadows_path)?;

    // 4. Settings
    let settings = Settings::load(&config.settings_path)?;

    // 5. Audit chain
    let keys = AuditKeys::load_or_generate(
        &config.audit_key_path,
        &config.audit_public_key_path,
        config.audit_key_bits,
    )?;
    let chain = AuditChain::open(&config.audit_log_path, &keys)?;
    let audit: Arc<dyn AuditSink> = Arc::new(ChainAuditSink::new(chain));

    // 6. Scan sessions; anything still running when we stopped cannot resume
    let store = ScanStore::new(&config.sessions_path, &config.snapshots_path);
    let mut state = store.load()?;
    let interrupted = recover_interrupted(&mut state, SystemClock.epoch_ms());
    if !interrupted.is_empty() {
        store.save_sessions(&state.sessions)?;
    }
    info!(
        "Recovered state: {} scans ({} interrupted), {} cluster snapshots",
        state.sessions.len(),
        interrupted.len(),
        state.snapshots.len()
    );

    // 7. Set up adapters
    let connector = KubeConnector::new(env::kubectl_bin());
    let analysis = ChatAnalysisAdapter::new(settings.chat_config())?;
    let shadows = VclusterShadowAdapter::new(
        ShadowConfig::new(&config.shadows_path)
            .provisioner_bin(env::provisioner_bin())
            .kubectl_bin(env::kubectl_bin()),
    );

    // 8. Connect configured clusters; one unreachable cluster doesn't block the rest
    let clusters = ClusterRegistry::new();
    for cluster in &settings.clusters {
        if let Err(e) =
            connect_cluster(&connector, &clusters, &cluster.id, cluster.kubeconfig.clone()).await
        {
            warn!(cluster_id = %cluster.id, error = %e, "configured cluster unavailable");
        }
    }

    let orchestrator = Orchestrator::new(
        WorkflowDeps {
            workflows: Registry::new(),
            shadows,
            analysis: analysis.clone(),
            connector: connector.clone(),
            clusters: clusters.clone(),
            audit: Arc::clone(&audit),
        },
        SystemClock,
        OrchestratorConfig::default(),
    );
    let scans = ScanEngine::new(
        ScanDeps {
            analysis: analysis.clone(),
            clusters: clusters.clone(),
            store: Arc::new(store),
            audit,
        },
        state,
        SystemClock,
        settings.scan_config(),
    );

    let ctx = Arc::new(ListenCtx {
        orchestrator,
        scans,
        analysis,
        connector,
        clusters,
        audit_log_path: config.audit_log_path.clone(),
        audit_public_key_path: config.audit_public_key_path.clone(),
        shutdown: Arc::new(Notify::new()),
    });

    // 9. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(socket = %config.socket_path.display(), "Daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            ctx,
            start_time: Instant::now(),
        },
        listener,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
