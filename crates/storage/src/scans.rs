// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable scan sessions and committed resource snapshots.
//!
//! Both live as whole JSON documents rewritten atomically on every change.
//! A document that fails to parse at startup is moved aside to a `.bak`
//! file and replaced with an empty one, so a torn write never blocks the
//! daemon from starting.

use crate::fsutil::{rotate_bak_path, write_atomic};
use kx_core::{ResourceSnapshot, ScanId, ScanSession, ScanStatus};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Log line written to sessions that were running when the process stopped.
pub const INTERRUPTED_MESSAGE: &str = "Scan interrupted by system restart.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything the scan engine persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanState {
    pub sessions: HashMap<ScanId, ScanSession>,
    /// Committed snapshots keyed by cluster id
    pub snapshots: HashMap<String, ResourceSnapshot>,
}

pub struct ScanStore {
    sessions_path: PathBuf,
    snapshots_path: PathBuf,
    write_lock: Mutex<()>,
}

impl ScanStore {
    pub fn new(sessions_path: impl Into<PathBuf>, snapshots_path: impl Into<PathBuf>) -> Self {
        Self {
            sessions_path: sessions_path.into(),
            snapshots_path: snapshots_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> Result<ScanState, StoreError> {
        Ok(ScanState {
            sessions: load_document(&self.sessions_path)?,
            snapshots: load_document(&self.snapshots_path)?,
        })
    }

    pub fn save_sessions(&self, sessions: &HashMap<ScanId, ScanSession>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(sessions)?;
        let _guard = self.write_lock.lock();
        write_atomic(&self.sessions_path, &bytes)?;
        Ok(())
    }

    pub fn save_snapshots(
        &self,
        snapshots: &HashMap<String, ResourceSnapshot>,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(snapshots)?;
        let _guard = self.write_lock.lock();
        write_atomic(&self.snapshots_path, &bytes)?;
        Ok(())
    }
}

fn load_document<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(e) => {
            let bak = rotate_bak_path(path);
            tracing::warn!(
                path = %path.display(),
                backup = %bak.display(),
                error = %e,
                "corrupt store document, moving aside"
            );
            std::fs::rename(path, &bak)?;
            Ok(T::default())
        }
    }
}

/// Force every non-terminal session to `failed`; returns the affected ids.
pub fn recover_interrupted(state: &mut ScanState, now_ms: u64) -> Vec<ScanId> {
    let mut recovered = Vec::new();
    for session in state.sessions.values_mut() {
        if session.status.is_terminal() {
            continue;
        }
        session.log.push(now_ms, INTERRUPTED_MESSAGE);
        session.finish(ScanStatus::Failed, now_ms);
        recovered.push(session.id.clone());
    }
    recovered
}

#[cfg(test)]
#[path = "scans_tests.rs"]
mod tests;
