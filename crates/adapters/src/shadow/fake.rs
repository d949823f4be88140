// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ShadowAdapter, ShadowError};
use async_trait::async_trait;
use kx_core::{ShadowEnvId, ShadowEnvironment, SourceCluster};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Recorded shadow call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowCall {
    Create { source_cluster_id: String },
    Destroy { id: ShadowEnvId },
}

enum CreateFailure {
    Provisioning(String),
    ConnectTimeout,
}

#[derive(Default)]
struct FakeShadowState {
    calls: Vec<ShadowCall>,
    created: Vec<ShadowEnvId>,
    destroyed: Vec<ShadowEnvId>,
    fail_create: Option<CreateFailure>,
}

/// Fake shadow manager that hands out environments without provisioning
#[derive(Clone, Default)]
pub struct FakeShadowAdapter {
    inner: Arc<Mutex<FakeShadowState>>,
}

impl FakeShadowAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ShadowCall> {
        self.inner.lock().calls.clone()
    }

    pub fn created(&self) -> Vec<ShadowEnvId> {
        self.inner.lock().created.clone()
    }

    pub fn destroyed(&self) -> Vec<ShadowEnvId> {
        self.inner.lock().destroyed.clone()
    }

    pub fn fail_create(&self, message: &str) {
        self.inner.lock().fail_create = Some(CreateFailure::Provisioning(message.to_string()));
    }

    /// Simulate a connection descriptor that never appears.
    pub fn fail_create_with_timeout(&self) {
        self.inner.lock().fail_create = Some(CreateFailure::ConnectTimeout);
    }
}

#[async_trait]
impl ShadowAdapter for FakeShadowAdapter {
    async fn create(&self, source: &SourceCluster) -> Result<ShadowEnvironment, ShadowError> {
        let mut state = self.inner.lock();
        state.calls.push(ShadowCall::Create { source_cluster_id: source.id.clone() });
        match state.fail_create {
            Some(CreateFailure::Provisioning(ref msg)) => {
                return Err(ShadowError::Provisioning(msg.clone()))
            }
            Some(CreateFailure::ConnectTimeout) => {
                return Err(ShadowError::ConnectTimeout(Duration::from_secs(30)))
            }
            None => {}
        }
        let name = format!("shadow-{}-{:04}", source.id, state.created.len());
        let id = ShadowEnvId::from_string(name.as_str());
        state.created.push(id.clone());
        Ok(ShadowEnvironment {
            id,
            source_cluster_id: source.id.clone(),
            namespace: name.clone(),
            kubeconfig_path: PathBuf::from(format!("/tmp/kx-fake-shadows/{name}.yaml")),
            created_at_ms: 0,
        })
    }

    async fn destroy(&self, id: &ShadowEnvId) {
        let mut state = self.inner.lock();
        state.calls.push(ShadowCall::Destroy { id: id.clone() });
        state.destroyed.push(id.clone());
    }
}
