// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster Access Port
//!
//! A [`ClusterAdapter`] lists, fetches and applies resources against one
//! cluster. A [`ClusterConnector`] builds adapters from a kubeconfig, which
//! is how the workflow reaches a freshly provisioned shadow environment.

mod kubernetes;

pub use kubernetes::{KubeClusterAdapter, KubeConnector, LISTED_KINDS};

use async_trait::async_trait;
use kx_core::Resource;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors from cluster operations
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster unreachable: {0}")]
    Connection(String),
    #[error("cluster api error: {0}")]
    Api(String),
    #[error("manifest rejected: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid kubeconfig: {0}")]
    Kubeconfig(String),
}

#[async_trait]
pub trait ClusterAdapter: Send + Sync + 'static {
    /// List every supported resource, optionally restricted to `namespaces`.
    async fn list_resources(
        &self,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<Resource>, ClusterError>;

    /// Fetch one resource; `Ok(None)` if it does not exist.
    async fn get_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Resource>, ClusterError>;

    /// Apply a full manifest into `namespace`.
    async fn apply_manifest(&self, manifest: &Value, namespace: &str) -> Result<(), ClusterError>;

    async fn check_connection(&self) -> bool;
}

/// Builds cluster adapters for a kubeconfig (`None` means the ambient config).
#[async_trait]
pub trait ClusterConnector: Clone + Send + Sync + 'static {
    async fn connect(
        &self,
        kubeconfig: Option<&Path>,
    ) -> Result<Arc<dyn ClusterAdapter>, ClusterError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ApplyCall, FakeClusterAdapter, FakeConnector};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
