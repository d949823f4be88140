// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ClusterAdapter, ClusterConnector, ClusterError};
use async_trait::async_trait;
use kx_core::Resource;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Recorded apply call
#[derive(Debug, Clone)]
pub struct ApplyCall {
    pub manifest: Value,
    pub namespace: String,
}

#[derive(Default)]
struct FakeClusterState {
    resources: Vec<Resource>,
    applies: Vec<ApplyCall>,
    list_calls: usize,
    list_error: Option<String>,
    list_delay: Option<Duration>,
    reject_apply: Option<String>,
    disconnected_checks: usize,
}

/// In-memory cluster for tests
#[derive(Clone, Default)]
pub struct FakeClusterAdapter {
    inner: Arc<Mutex<FakeClusterState>>,
}

impl FakeClusterAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources(resources: Vec<Resource>) -> Self {
        let fake = Self::new();
        fake.set_resources(resources);
        fake
    }

    pub fn set_resources(&self, resources: Vec<Resource>) {
        self.inner.lock().resources = resources;
    }

    /// Insert or replace a resource by unique id.
    pub fn upsert(&self, resource: Resource) {
        let mut state = self.inner.lock();
        match state.resources.iter_mut().find(|r| r.unique_id == resource.unique_id) {
            Some(existing) => *existing = resource,
            None => state.resources.push(resource),
        }
    }

    pub fn remove(&self, unique_id: &str) {
        self.inner.lock().resources.retain(|r| r.unique_id != unique_id);
    }

    pub fn applies(&self) -> Vec<ApplyCall> {
        self.inner.lock().applies.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().list_calls
    }

    /// Make `list_resources` fail with a connection error.
    pub fn fail_list(&self, message: &str) {
        self.inner.lock().list_error = Some(message.to_string());
    }

    /// Delay `list_resources` (for timeout tests).
    pub fn set_list_delay(&self, delay: Duration) {
        self.inner.lock().list_delay = Some(delay);
    }

    /// Make `apply_manifest` report a rejection.
    pub fn reject_apply(&self, stderr: &str) {
        self.inner.lock().reject_apply = Some(stderr.to_string());
    }

    /// Report disconnected for the next `n` connection checks.
    pub fn disconnect_for(&self, n: usize) {
        self.inner.lock().disconnected_checks = n;
    }
}

#[async_trait]
impl ClusterAdapter for FakeClusterAdapter {
    async fn list_resources(
        &self,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<Resource>, ClusterError> {
        let delay = {
            let mut state = self.inner.lock();
            state.list_calls += 1;
            state.list_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.inner.lock();
        if let Some(ref msg) = state.list_error {
            return Err(ClusterError::Connection(msg.clone()));
        }
        Ok(state
            .resources
            .iter()
            .filter(|r| namespaces.map_or(true, |ns| ns.contains(&r.namespace)))
            .cloned()
            .collect())
    }

    async fn get_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Resource>, ClusterError> {
        let id = kx_core::unique_id(kind, namespace, name);
        Ok(self.inner.lock().resources.iter().find(|r| r.unique_id == id).cloned())
    }

    async fn apply_manifest(&self, manifest: &Value, namespace: &str) -> Result<(), ClusterError> {
        let mut state = self.inner.lock();
        state.applies.push(ApplyCall { manifest: manifest.clone(), namespace: namespace.to_string() });
        match state.reject_apply {
            Some(ref stderr) => Err(ClusterError::Rejected(stderr.clone())),
            None => Ok(()),
        }
    }

    async fn check_connection(&self) -> bool {
        let mut state = self.inner.lock();
        if state.disconnected_checks > 0 {
            state.disconnected_checks -= 1;
            return false;
        }
        true
    }
}

#[derive(Default)]
struct FakeConnectorState {
    by_path: HashMap<PathBuf, FakeClusterAdapter>,
    fallback: FakeClusterAdapter,
    connects: Vec<Option<PathBuf>>,
    fail: Option<String>,
}

/// Connector handing out [`FakeClusterAdapter`]s keyed by kubeconfig path.
///
/// Unregistered paths share one fallback adapter, which is where a shadow
/// environment's traffic lands in workflow tests.
#[derive(Clone, Default)]
pub struct FakeConnector {
    inner: Arc<Mutex<FakeConnectorState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<PathBuf>, adapter: FakeClusterAdapter) {
        self.inner.lock().by_path.insert(path.into(), adapter);
    }

    pub fn fallback(&self) -> FakeClusterAdapter {
        self.inner.lock().fallback.clone()
    }

    pub fn connects(&self) -> Vec<Option<PathBuf>> {
        self.inner.lock().connects.clone()
    }

    pub fn fail_connect(&self, message: &str) {
        self.inner.lock().fail = Some(message.to_string());
    }
}

#[async_trait]
impl ClusterConnector for FakeConnector {
    async fn connect(
        &self,
        kubeconfig: Option<&Path>,
    ) -> Result<Arc<dyn ClusterAdapter>, ClusterError> {
        let mut state = self.inner.lock();
        state.connects.push(kubeconfig.map(Path::to_path_buf));
        if let Some(ref msg) = state.fail {
            return Err(ClusterError::Kubeconfig(msg.clone()));
        }
        let adapter = kubeconfig
            .and_then(|p| state.by_path.get(p).cloned())
            .unwrap_or_else(|| state.fallback.clone());
        Ok(Arc::new(adapter))
    }
}
