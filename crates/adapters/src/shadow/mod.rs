// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shadow Environment Manager
//!
//! Provisions disposable, namespace-isolated virtual clusters inside a
//! source cluster and keeps a local tunnel open to each one.
//!
//! # Lifecycle
//!
//! ```text
//! create:  provision ──► annotate ns ──► spawn tunnel ──► poll descriptor
//! destroy: SIGTERM tunnel ──(grace)──► SIGKILL ──► delete environment
//! ```

mod vcluster;

pub use vcluster::{shadow_name, VclusterShadowAdapter, MANAGED_ANNOTATION};

use async_trait::async_trait;
use kx_core::{ShadowEnvId, ShadowEnvironment, SourceCluster};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from shadow environment provisioning
#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("provisioning failed: {0}")]
    Provisioning(String),
    #[error("timed out after {}s waiting for shadow connection descriptor", .0.as_secs())]
    ConnectTimeout(Duration),
    #[error("tunnel process exited before connecting: {0}")]
    TunnelExited(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ShadowAdapter: Clone + Send + Sync + 'static {
    /// Provision a shadow environment over `source` and open its tunnel.
    async fn create(&self, source: &SourceCluster) -> Result<ShadowEnvironment, ShadowError>;

    /// Tear down the tunnel and the environment. Best-effort: failures are logged.
    async fn destroy(&self, id: &ShadowEnvId);
}

/// Provisioning settings for [`VclusterShadowAdapter`]
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    pub provisioner_bin: String,
    pub kubectl_bin: String,
    /// Where tunnels write their connection descriptors
    pub descriptor_dir: PathBuf,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub tunnel_grace: Duration,
    pub create_timeout: Duration,
    pub command_timeout: Duration,
}

impl ShadowConfig {
    pub fn new(descriptor_dir: impl Into<PathBuf>) -> Self {
        Self {
            provisioner_bin: "vcluster".to_string(),
            kubectl_bin: "kubectl".to_string(),
            descriptor_dir: descriptor_dir.into(),
            poll_attempts: 30,
            poll_interval: Duration::from_secs(1),
            tunnel_grace: Duration::from_secs(5),
            create_timeout: Duration::from_secs(300),
            command_timeout: Duration::from_secs(60),
        }
    }

    kx_core::setters! {
        into {
            provisioner_bin: String,
            kubectl_bin: String,
        }
        set {
            poll_attempts: u32,
            poll_interval: Duration,
            tunnel_grace: Duration,
            create_timeout: Duration,
            command_timeout: Duration,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeShadowAdapter, ShadowCall};

#[cfg(test)]
#[path = "vcluster_tests.rs"]
mod tests;
