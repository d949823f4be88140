// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit signing key store.
//!
//! The private key is a PKCS#8 PEM file readable only by the owner. The
//! public half sits next to it so the log can be verified without access
//! to the private key.

use super::AuditError;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{BlindedSigningKey, VerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::io::Write;
use std::path::Path;

pub const DEFAULT_KEY_BITS: usize = 2048;

#[derive(Clone)]
pub struct AuditKeys {
    private: RsaPrivateKey,
}

impl AuditKeys {
    pub fn generate(bits: usize) -> Result<Self, AuditError> {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| AuditError::Key(e.to_string()))?;
        Ok(Self { private })
    }

    /// Load the private key, or generate and persist a fresh pair when absent.
    pub fn load_or_generate(
        private_path: &Path,
        public_path: &Path,
        bits: usize,
    ) -> Result<Self, AuditError> {
        let keys = match std::fs::read_to_string(private_path) {
            Ok(pem) => {
                let private = RsaPrivateKey::from_pkcs8_pem(&pem)
                    .map_err(|e| AuditError::Key(e.to_string()))?;
                Self { private }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %private_path.display(),
                    "no audit key found, generating a new one"
                );
                let keys = Self::generate(bits)?;
                keys.write_private(private_path)?;
                keys
            }
            Err(e) => return Err(e.into()),
        };
        if !public_path.exists() {
            keys.write_public(public_path)?;
        }
        Ok(keys)
    }

    pub fn verifying_key(&self) -> VerifyingKey<Sha256> {
        VerifyingKey::new(self.private.to_public_key())
    }

    pub(crate) fn signing_key(&self) -> BlindedSigningKey<Sha256> {
        BlindedSigningKey::new(self.private.clone())
    }

    pub fn load_verifying_key(path: &Path) -> Result<VerifyingKey<Sha256>, AuditError> {
        let pem = std::fs::read_to_string(path)?;
        let public =
            RsaPublicKey::from_public_key_pem(&pem).map_err(|e| AuditError::Key(e.to_string()))?;
        Ok(VerifyingKey::new(public))
    }

    fn write_private(&self, path: &Path) -> Result<(), AuditError> {
        let pem =
            self.private.to_pkcs8_pem(LineEnding::LF).map_err(|e| AuditError::Key(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        file.write_all(pem.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn write_public(&self, path: &Path) -> Result<(), AuditError> {
        let pem = self
            .private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuditError::Key(e.to_string()))?;
        std::fs::write(path, pem)?;
        Ok(())
    }
}

impl std::fmt::Debug for AuditKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditKeys").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
