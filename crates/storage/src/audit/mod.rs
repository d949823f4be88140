// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tamper-evident audit chain.
//!
//! The log is JSONL. Every line is one [`AuditEntry`] whose `previous_hash`
//! is the SHA-256 of the raw bytes of the line before it, or
//! [`GENESIS_HASH`] for the first line. The signature covers a canonical
//! encoding of the entry without its signature (see [`canonical_payload`]).

mod keys;
mod verify;

pub use keys::{AuditKeys, DEFAULT_KEY_BITS};
pub use verify::{verify_log, EntryCheck, VerifyReport};

use parking_lot::Mutex;
use rsa::pss::BlindedSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// `previous_hash` of the first entry in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key error: {0}")]
    Key(String),
    #[error("signature error: {0}")]
    Signature(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub actor: String,
    pub action: String,
    pub details: Value,
    pub previous_hash: String,
    /// Hex-encoded RSA-PSS signature over the canonical payload
    pub signature: String,
}

/// Signed fields, in serialization order.
#[derive(Serialize)]
struct SignedPayload<'a> {
    action: &'a str,
    actor: &'a str,
    details: &'a Value,
    previous_hash: &'a str,
    timestamp: &'a str,
}

/// Deterministic byte encoding of everything an entry signs.
///
/// Field order is fixed by [`SignedPayload`]; `details` encodes exactly as it
/// was stored, so a parsed entry re-encodes to the bytes that were signed.
pub(crate) fn canonical_payload(
    timestamp: &str,
    actor: &str,
    action: &str,
    details: &Value,
    previous_hash: &str,
) -> Result<Vec<u8>, AuditError> {
    let payload = SignedPayload { action, actor, details, previous_hash, timestamp };
    Ok(serde_json::to_vec(&payload)?)
}

pub(crate) fn line_hash(line: &[u8]) -> String {
    hex::encode(Sha256::digest(line))
}

/// Append-only writer for one audit log file.
pub struct AuditChain {
    path: PathBuf,
    signing_key: BlindedSigningKey<Sha256>,
    /// Hash of the last line on disk; the lock also serializes appends.
    last_hash: Mutex<String>,
}

impl AuditChain {
    /// Open (or prepare to create) the log at `path`, resuming after its last line.
    pub fn open(path: impl Into<PathBuf>, keys: &AuditKeys) -> Result<Self, AuditError> {
        let path = path.into();
        let last_hash = last_line_hash(&path)?;
        Ok(Self { path, signing_key: keys.signing_key(), last_hash: Mutex::new(last_hash) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(
        &self,
        actor: &str,
        action: &str,
        details: Value,
    ) -> Result<AuditEntry, AuditError> {
        let mut last_hash = self.last_hash.lock();

        let timestamp = chrono::Utc::now().to_rfc3339();
        let payload = canonical_payload(&timestamp, actor, action, &details, &last_hash)?;
        let signature = self.signing_key.sign_with_rng(&mut rand::thread_rng(), &payload);

        let entry = AuditEntry {
            timestamp,
            actor: actor.to_string(),
            action: action.to_string(),
            details,
            previous_hash: last_hash.clone(),
            signature: hex::encode(signature.to_bytes()),
        };
        let line = serde_json::to_vec(&entry)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut buf = line.clone();
        buf.push(b'\n');
        file.write_all(&buf)?;
        file.sync_data()?;

        *last_hash = line_hash(&line);
        tracing::info!(actor, action, "audit entry appended");
        Ok(entry)
    }
}

/// Entries whose `details.cluster_id` is `cluster_id`, newest first, at most `limit`.
///
/// Read-only and unverified; lines that fail to parse are skipped.
pub fn cluster_history(
    path: &Path,
    cluster_id: &str,
    limit: usize,
) -> Result<Vec<AuditEntry>, AuditError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut entries: Vec<AuditEntry> = bytes
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_slice::<AuditEntry>(line).ok())
        .filter(|entry| entry.details.get("cluster_id").and_then(Value::as_str) == Some(cluster_id))
        .collect();
    entries.reverse();
    entries.truncate(limit);
    Ok(entries)
}

fn last_line_hash(path: &Path) -> Result<String, AuditError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GENESIS_HASH.to_string()),
        Err(e) => return Err(e.into()),
    };
    Ok(bytes
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .last()
        .map(line_hash)
        .unwrap_or_else(|| GENESIS_HASH.to_string()))
}

#[cfg(test)]
pub(crate) fn test_keys() -> &'static AuditKeys {
    static KEYS: std::sync::OnceLock<AuditKeys> = std::sync::OnceLock::new();
    KEYS.get_or_init(|| AuditKeys::generate(1024).unwrap())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
