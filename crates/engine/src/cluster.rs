// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connected clusters

use crate::registry::Registry;
use kx_adapters::{ClusterAdapter, ClusterConnector, ClusterError};
use kx_core::SourceCluster;
use std::path::PathBuf;
use std::sync::Arc;

/// A live connection to one cluster.
#[derive(Clone)]
pub struct ClusterHandle {
    pub id: String,
    pub kubeconfig: Option<PathBuf>,
    pub adapter: Arc<dyn ClusterAdapter>,
}

impl ClusterHandle {
    /// What the shadow provisioner needs to build inside this cluster.
    pub fn source(&self) -> SourceCluster {
        SourceCluster { id: self.id.clone(), kubeconfig: self.kubeconfig.clone() }
    }
}

impl std::fmt::Debug for ClusterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterHandle")
            .field("id", &self.id)
            .field("kubeconfig", &self.kubeconfig)
            .finish_non_exhaustive()
    }
}

pub type ClusterRegistry = Registry<String, ClusterHandle>;

/// Connect to a cluster, confirm it answers, and register it under `id`.
///
/// Replaces any existing connection with the same id.
pub async fn connect_cluster<C: ClusterConnector>(
    connector: &C,
    clusters: &ClusterRegistry,
    id: &str,
    kubeconfig: Option<PathBuf>,
) -> Result<ClusterHandle, ClusterError> {
    let adapter = connector.connect(kubeconfig.as_deref()).await?;
    if !adapter.check_connection().await {
        return Err(ClusterError::Connection(format!("cluster {id} did not answer")));
    }
    let handle = ClusterHandle { id: id.to_string(), kubeconfig, adapter };
    clusters.insert(id.to_string(), handle.clone());
    tracing::info!(cluster_id = id, "cluster connected");
    Ok(handle)
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod tests;
