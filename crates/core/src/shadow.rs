// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shadow environment records

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Name of a shadow environment; also its namespace in the source cluster.
    pub struct ShadowEnvId("shadow-");
}

/// The cluster a shadow environment is provisioned inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCluster {
    pub id: String,
    /// Kubeconfig for the source control plane; `None` uses the ambient config.
    pub kubeconfig: Option<PathBuf>,
}

/// A live, isolated copy of a cluster reachable through a local tunnel.
///
/// The tunnel process itself is owned by the provisioning adapter; this
/// record only carries what callers need to talk to the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowEnvironment {
    pub id: ShadowEnvId,
    pub source_cluster_id: String,
    pub namespace: String,
    /// Connection descriptor written by the tunnel.
    pub kubeconfig_path: PathBuf,
    pub created_at_ms: u64,
}
