// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{canonical_payload, line_hash, AuditEntry, AuditError, GENESIS_HASH};
use rsa::pss::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCheck {
    pub index: usize,
    pub signature_ok: bool,
    /// False from the first broken link onward.
    pub chain_ok: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub entries: Vec<EntryCheck>,
    pub first_tampered: Option<usize>,
}

impl VerifyReport {
    pub fn is_intact(&self) -> bool {
        self.first_tampered.is_none()
    }
}

/// Check every line of the log at `path` against its predecessor and signature.
///
/// Reports where tampering begins; nothing is repaired. A missing log is an
/// empty, intact report.
pub fn verify_log(path: &Path, key: &VerifyingKey<Sha256>) -> Result<VerifyReport, AuditError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(VerifyReport::default()),
        Err(e) => return Err(e.into()),
    };

    let mut report = VerifyReport::default();
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut chain_intact = true;

    for (index, line) in bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).enumerate() {
        let entry = serde_json::from_slice::<AuditEntry>(line).ok();
        let linked = entry.as_ref().is_some_and(|e| e.previous_hash == expected_prev);
        chain_intact &= linked;
        let signature_ok = entry.as_ref().is_some_and(|e| signature_valid(e, key));

        let check = EntryCheck { index, signature_ok, chain_ok: chain_intact };
        if report.first_tampered.is_none() && !(check.signature_ok && check.chain_ok) {
            tracing::warn!(index, signature_ok, chain_ok = chain_intact, "audit log tampering");
            report.first_tampered = Some(index);
        }
        report.entries.push(check);
        expected_prev = line_hash(line);
    }
    Ok(report)
}

fn signature_valid(entry: &AuditEntry, key: &VerifyingKey<Sha256>) -> bool {
    let Ok(raw) = hex::decode(&entry.signature) else {
        return false;
    };
    // Only the exact lowercase encoding the writer produces is accepted.
    if hex::encode(&raw) != entry.signature {
        return false;
    }
    let Ok(signature) = Signature::try_from(raw.as_slice()) else {
        return false;
    };
    let Ok(payload) = canonical_payload(
        &entry.timestamp,
        &entry.actor,
        &entry.action,
        &entry.details,
        &entry.previous_hash,
    ) else {
        return false;
    };
    key.verify(&payload, &signature).is_ok()
}
