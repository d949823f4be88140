// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vcluster-backed shadow environments.

use super::{ShadowAdapter, ShadowConfig, ShadowError};
use crate::subprocess;
use async_trait::async_trait;
use kx_core::{Clock, ShadowEnvId, ShadowEnvironment, SourceCluster, SystemClock};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Annotation marking namespaces created for shadow environments.
pub const MANAGED_ANNOTATION: &str = "kortex.io/managed-by=kortex";

const MAX_SLUG_LEN: usize = 40;

/// Collision-resistant, DNS-safe environment name for `cluster_id`.
pub fn shadow_name(cluster_id: &str) -> String {
    let mut slug: String = cluster_id
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "cluster" } else { slug };
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("shadow-{}-{}", slug, &random[..8])
}

/// A running `connect` tunnel. Dropping it kills the process.
struct TunnelProcess {
    child: Child,
    /// Kubeconfig of the host cluster, reused for deletion
    source_kubeconfig: Option<PathBuf>,
    descriptor: PathBuf,
    last_output: Arc<Mutex<String>>,
}

impl TunnelProcess {
    /// SIGTERM, wait up to `grace`, then SIGKILL.
    async fn shutdown(mut self, id: &ShadowEnvId, grace: Duration) {
        if let Some(pid) = self.child.id() {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::debug!(shadow_id = %id, error = %e, "SIGTERM to tunnel failed");
            }
            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(Ok(status)) => tracing::info!(shadow_id = %id, %status, "tunnel stopped"),
                Ok(Err(e)) => tracing::warn!(shadow_id = %id, error = %e, "failed to reap tunnel"),
                Err(_) => {
                    tracing::warn!(shadow_id = %id, "tunnel ignored SIGTERM, killing");
                    if let Err(e) = self.child.kill().await {
                        tracing::warn!(shadow_id = %id, error = %e, "failed to kill tunnel");
                    }
                }
            }
        }
        if let Err(e) = tokio::fs::remove_file(&self.descriptor).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(shadow_id = %id, error = %e, "failed to remove descriptor");
            }
        }
    }
}

/// Shadow adapter driving the `vcluster` CLI.
#[derive(Clone)]
pub struct VclusterShadowAdapter<C: Clock = SystemClock> {
    config: Arc<ShadowConfig>,
    tunnels: Arc<Mutex<HashMap<ShadowEnvId, TunnelProcess>>>,
    clock: C,
}

impl VclusterShadowAdapter<SystemClock> {
    pub fn new(config: ShadowConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> VclusterShadowAdapter<C> {
    pub fn with_clock(config: ShadowConfig, clock: C) -> Self {
        Self { config: Arc::new(config), tunnels: Arc::new(Mutex::new(HashMap::new())), clock }
    }

    /// Number of tunnels currently held open.
    pub fn active_tunnels(&self) -> usize {
        self.tunnels.lock().len()
    }

    fn command(&self, program: &str, kubeconfig: Option<&Path>) -> Command {
        let mut cmd = Command::new(program);
        if let Some(path) = kubeconfig {
            cmd.env("KUBECONFIG", path);
        }
        cmd
    }

    async fn annotate(&self, namespace: &str, kubeconfig: Option<&Path>) {
        let mut cmd = self.command(&self.config.kubectl_bin, kubeconfig);
        cmd.args(["annotate", "namespace", namespace, MANAGED_ANNOTATION, "--overwrite"]);
        if let Err(e) = subprocess::run(cmd, None, self.config.command_timeout).await {
            tracing::warn!(%namespace, error = %e, "failed to annotate shadow namespace");
        }
    }

    async fn delete_environment(&self, name: &str, kubeconfig: Option<&Path>) {
        let mut cmd = self.command(&self.config.provisioner_bin, kubeconfig);
        cmd.args(["delete", name, "-n", name]);
        match subprocess::run(cmd, None, self.config.command_timeout).await {
            Ok(_) => tracing::info!(shadow_id = %name, "shadow environment deleted"),
            Err(e) => tracing::error!(shadow_id = %name, error = %e, "failed to delete shadow environment"),
        }
    }

    async fn open_tunnel(
        &self,
        id: &ShadowEnvId,
        descriptor: &Path,
        source: &SourceCluster,
    ) -> Result<TunnelProcess, ShadowError> {
        let name = id.as_str();
        let mut cmd = self.command(&self.config.provisioner_bin, source.kubeconfig.as_deref());
        cmd.args(["connect", name, "-n", name, "--update-current=false", "--kube-config"])
            .arg(descriptor)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd
            .spawn()
            .map_err(|e| ShadowError::Provisioning(format!("failed to spawn tunnel: {e}")))?;

        // Drain stderr so a chatty tunnel never blocks on a full pipe
        let last_output = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let last = Arc::clone(&last_output);
            let shadow_id = id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(%shadow_id, %line, "tunnel output");
                    *last.lock() = line;
                }
            });
        }

        let mut tunnel = TunnelProcess {
            child,
            source_kubeconfig: source.kubeconfig.clone(),
            descriptor: descriptor.to_path_buf(),
            last_output,
        };

        // A descriptor only counts while its tunnel is still alive
        let started = tokio::time::Instant::now();
        for attempt in 0..self.config.poll_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }
            if let Some(status) = tunnel.child.try_wait()? {
                let output = tunnel.last_output.lock().clone();
                return Err(ShadowError::TunnelExited(format!("{status}: {output}")));
            }
            if descriptor_ready(descriptor).await {
                tracing::info!(shadow_id = %id, attempt, "shadow descriptor ready, tunnel active");
                return Ok(tunnel);
            }
        }

        let waited = started.elapsed();
        tunnel.shutdown(id, self.config.tunnel_grace).await;
        Err(ShadowError::ConnectTimeout(waited))
    }
}

async fn descriptor_ready(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.len() > 0).unwrap_or(false)
}

#[async_trait]
impl<C: Clock> ShadowAdapter for VclusterShadowAdapter<C> {
    async fn create(&self, source: &SourceCluster) -> Result<ShadowEnvironment, ShadowError> {
        let name = shadow_name(&source.id);
        let id = ShadowEnvId::from_string(name.as_str());
        let kubeconfig = source.kubeconfig.as_deref();

        tokio::fs::create_dir_all(&self.config.descriptor_dir).await?;
        let descriptor = self.config.descriptor_dir.join(format!("{name}.yaml"));

        tracing::info!(shadow_id = %id, cluster_id = %source.id, "provisioning shadow environment");
        let mut cmd = self.command(&self.config.provisioner_bin, kubeconfig);
        cmd.args(["create", name.as_str(), "-n", name.as_str(), "--isolate", "--connect=false"]);
        subprocess::run(cmd, None, self.config.create_timeout)
            .await
            .map_err(|e| ShadowError::Provisioning(e.to_string()))?;

        self.annotate(&name, kubeconfig).await;

        let tunnel = match self.open_tunnel(&id, &descriptor, source).await {
            Ok(tunnel) => tunnel,
            Err(e) => {
                tracing::error!(shadow_id = %id, error = %e, "shadow tunnel failed");
                self.delete_environment(&name, kubeconfig).await;
                return Err(e);
            }
        };
        self.tunnels.lock().insert(id.clone(), tunnel);

        Ok(ShadowEnvironment {
            id,
            source_cluster_id: source.id.clone(),
            namespace: name,
            kubeconfig_path: descriptor,
            created_at_ms: self.clock.epoch_ms(),
        })
    }

    async fn destroy(&self, id: &ShadowEnvId) {
        let tunnel = self.tunnels.lock().remove(id);
        let kubeconfig = match tunnel {
            Some(tunnel) => {
                let kubeconfig = tunnel.source_kubeconfig.clone();
                tunnel.shutdown(id, self.config.tunnel_grace).await;
                kubeconfig
            }
            None => {
                tracing::warn!(shadow_id = %id, "no tunnel registered for shadow environment");
                None
            }
        };
        self.delete_environment(id.as_str(), kubeconfig.as_deref()).await;
    }
}
