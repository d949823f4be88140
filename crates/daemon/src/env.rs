// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: KX_STATE_DIR > XDG_STATE_HOME/kortex > ~/.local/state/kortex
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("KX_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("kortex"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/kortex"))
}

/// Default IPC timeout
pub fn ipc_timeout() -> Duration {
    std::env::var("KX_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Shadow environment provisioner binary (default `vcluster`)
pub fn provisioner_bin() -> String {
    std::env::var("KX_PROVISIONER_BIN")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "vcluster".to_string())
}

/// Cluster CLI used for server-side apply and namespace labelling (default `kubectl`)
pub fn kubectl_bin() -> String {
    std::env::var("KX_KUBECTL_BIN")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "kubectl".to_string())
}

/// Look up the AI backend's API key from the variable named in settings.
pub fn api_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.is_empty())
}
