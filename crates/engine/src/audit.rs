// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit sink consumed by the engines

use async_trait::async_trait;
use kx_storage::{AuditChain, AuditError};
use serde_json::Value;
use std::sync::Arc;

/// Where accepted automated actions are recorded.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn record(&self, actor: &str, action: &str, details: Value) -> Result<(), AuditError>;
}

/// Appends to the signed audit chain on the blocking pool.
pub struct ChainAuditSink {
    chain: Arc<AuditChain>,
}

impl ChainAuditSink {
    pub fn new(chain: AuditChain) -> Self {
        Self { chain: Arc::new(chain) }
    }
}

#[async_trait]
impl AuditSink for ChainAuditSink {
    async fn record(&self, actor: &str, action: &str, details: Value) -> Result<(), AuditError> {
        let chain = Arc::clone(&self.chain);
        let (actor, action) = (actor.to_string(), action.to_string());
        tokio::task::spawn_blocking(move || chain.append(&actor, &action, details))
            .await
            .map_err(|e| AuditError::Io(std::io::Error::other(e)))??;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct AuditRecord {
        pub actor: String,
        pub action: String,
        pub details: Value,
    }

    #[derive(Default)]
    struct FakeAuditState {
        records: Vec<AuditRecord>,
        fail: Option<String>,
    }

    #[derive(Clone, Default)]
    pub struct FakeAuditSink {
        inner: Arc<Mutex<FakeAuditState>>,
    }

    impl FakeAuditSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn records(&self) -> Vec<AuditRecord> {
            self.inner.lock().records.clone()
        }

        pub fn actions(&self) -> Vec<String> {
            self.inner.lock().records.iter().map(|r| r.action.clone()).collect()
        }

        pub fn fail(&self, message: &str) {
            self.inner.lock().fail = Some(message.to_string());
        }
    }

    #[async_trait]
    impl AuditSink for FakeAuditSink {
        async fn record(
            &self,
            actor: &str,
            action: &str,
            details: Value,
        ) -> Result<(), AuditError> {
            let mut state = self.inner.lock();
            if let Some(ref msg) = state.fail {
                return Err(AuditError::Signature(msg.clone()));
            }
            state.records.push(AuditRecord {
                actor: actor.to_string(),
                action: action.to_string(),
                details,
            });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{AuditRecord, FakeAuditSink};

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
