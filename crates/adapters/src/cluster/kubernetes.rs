// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes implementation of the Cluster Access Port.
//!
//! Reads go through `kube-rs` with dynamic objects so every listed kind
//! shares one code path. Writes shell out to `kubectl apply`, which accepts
//! whatever full manifest the AI backend produced.

use super::{ClusterAdapter, ClusterConnector, ClusterError};
use crate::subprocess::{self, SubprocessError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use kx_core::Resource;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// `(group, version, kind, plural, namespaced)` for every kind a scan covers.
pub const LISTED_KINDS: &[(&str, &str, &str, &str, bool)] = &[
    ("", "v1", "Node", "nodes", false),
    ("", "v1", "Namespace", "namespaces", false),
    ("apps", "v1", "Deployment", "deployments", true),
    ("apps", "v1", "StatefulSet", "statefulsets", true),
    ("apps", "v1", "DaemonSet", "daemonsets", true),
    ("apps", "v1", "ReplicaSet", "replicasets", true),
    ("batch", "v1", "Job", "jobs", true),
    ("batch", "v1", "CronJob", "cronjobs", true),
    ("", "v1", "Pod", "pods", true),
    ("", "v1", "Service", "services", true),
    ("networking.k8s.io", "v1", "Ingress", "ingresses", true),
    ("", "v1", "ConfigMap", "configmaps", true),
    ("", "v1", "Secret", "secrets", true),
    ("", "v1", "PersistentVolumeClaim", "persistentvolumeclaims", true),
    ("", "v1", "PersistentVolume", "persistentvolumes", false),
    ("storage.k8s.io", "v1", "StorageClass", "storageclasses", false),
    ("", "v1", "ServiceAccount", "serviceaccounts", true),
    ("rbac.authorization.k8s.io", "v1", "Role", "roles", true),
    ("rbac.authorization.k8s.io", "v1", "RoleBinding", "rolebindings", true),
    ("rbac.authorization.k8s.io", "v1", "ClusterRole", "clusterroles", false),
    ("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding", "clusterrolebindings", false),
];

const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(3);
const APPLY_TIMEOUT: Duration = Duration::from_secs(120);

fn api_resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

fn to_resource(obj: DynamicObject, ar: &ApiResource) -> Result<Resource, ClusterError> {
    let name = obj.metadata.name.clone().unwrap_or_default();
    let namespace = obj.metadata.namespace.clone().unwrap_or_default();
    let mut content = serde_json::to_value(&obj).map_err(|e| ClusterError::Api(e.to_string()))?;
    // List responses omit per-item type meta
    if let Some(map) = content.as_object_mut() {
        map.insert("apiVersion".into(), Value::String(ar.api_version.clone()));
        map.insert("kind".into(), Value::String(ar.kind.clone()));
    }
    Ok(Resource::new(ar.kind.clone(), name, namespace, ar.api_version.clone(), content))
}

/// Cluster adapter backed by a `kube::Client` plus the `kubectl` CLI.
#[derive(Clone)]
pub struct KubeClusterAdapter {
    client: Client,
    kubeconfig: Option<PathBuf>,
    kubectl_bin: String,
}

impl KubeClusterAdapter {
    pub fn new(client: Client, kubeconfig: Option<PathBuf>, kubectl_bin: impl Into<String>) -> Self {
        Self { client, kubeconfig, kubectl_bin: kubectl_bin.into() }
    }

    async fn list_kind(
        &self,
        ar: &ApiResource,
        namespaced: bool,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<DynamicObject>, kube::Error> {
        let lp = ListParams::default();
        match namespaces {
            Some(namespaces) if namespaced => {
                let mut items = Vec::new();
                for ns in namespaces {
                    let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), ns, ar);
                    items.extend(api.list(&lp).await?.items);
                }
                Ok(items)
            }
            _ => {
                let api: Api<DynamicObject> = Api::all_with(self.client.clone(), ar);
                Ok(api.list(&lp).await?.items)
            }
        }
    }
}

#[async_trait]
impl ClusterAdapter for KubeClusterAdapter {
    async fn list_resources(
        &self,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<Resource>, ClusterError> {
        let mut resources = Vec::new();
        let mut last_error = None;
        let mut any_ok = false;

        for (group, version, kind, plural, namespaced) in LISTED_KINDS {
            let ar = api_resource(group, version, kind, plural);
            match self.list_kind(&ar, *namespaced, namespaces).await {
                Ok(items) => {
                    any_ok = true;
                    for obj in items {
                        resources.push(to_resource(obj, &ar)?);
                    }
                }
                Err(e) => {
                    // One unreadable kind (RBAC, missing CRD group) must not hide the rest
                    tracing::warn!(kind = %kind, error = %e, "failed to list kind");
                    last_error = Some(e);
                }
            }
        }

        match (any_ok, last_error) {
            (false, Some(e)) => Err(ClusterError::Connection(e.to_string())),
            _ => Ok(resources),
        }
    }

    async fn get_resource(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Resource>, ClusterError> {
        let Some((group, version, kind, plural, namespaced)) =
            LISTED_KINDS.iter().find(|(_, _, k, _, _)| k.eq_ignore_ascii_case(kind))
        else {
            return Err(ClusterError::Api(format!("unsupported kind: {kind}")));
        };
        let ar = api_resource(group, version, kind, plural);
        let api: Api<DynamicObject> = if *namespaced {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        };
        match api.get_opt(name).await {
            Ok(Some(obj)) => Ok(Some(to_resource(obj, &ar)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ClusterError::Api(e.to_string())),
        }
    }

    async fn apply_manifest(&self, manifest: &Value, namespace: &str) -> Result<(), ClusterError> {
        let body = serde_json::to_vec(manifest).map_err(|e| ClusterError::Io(e.to_string()))?;
        let mut cmd = Command::new(&self.kubectl_bin);
        cmd.args(["apply", "-f", "-"]);
        if !namespace.is_empty() {
            cmd.args(["-n", namespace]);
        }
        if let Some(ref path) = self.kubeconfig {
            cmd.env("KUBECONFIG", path);
        }
        match subprocess::run(cmd, Some(body), APPLY_TIMEOUT).await {
            Ok(out) => {
                tracing::info!(%namespace, output = %out, "manifest applied");
                Ok(())
            }
            Err(SubprocessError::Failed { stderr, .. }) => Err(ClusterError::Rejected(stderr)),
            Err(e @ SubprocessError::Timeout { .. }) => Err(ClusterError::Connection(e.to_string())),
            Err(e @ SubprocessError::Spawn { .. }) => Err(ClusterError::Io(e.to_string())),
        }
    }

    async fn check_connection(&self) -> bool {
        let nodes: Api<Node> = Api::all(self.client.clone());
        match tokio::time::timeout(CONNECTION_CHECK_TIMEOUT, nodes.list(&ListParams::default().limit(1)))
            .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "connection check failed");
                false
            }
            Err(_) => {
                tracing::debug!("connection check timed out");
                false
            }
        }
    }
}

/// Connector that builds [`KubeClusterAdapter`]s from kubeconfig files.
#[derive(Clone)]
pub struct KubeConnector {
    kubectl_bin: String,
}

impl KubeConnector {
    pub fn new(kubectl_bin: impl Into<String>) -> Self {
        Self { kubectl_bin: kubectl_bin.into() }
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(
        &self,
        kubeconfig: Option<&Path>,
    ) -> Result<Arc<dyn ClusterAdapter>, ClusterError> {
        let client = match kubeconfig {
            Some(path) => {
                let kc = Kubeconfig::read_from(path).map_err(|e| {
                    ClusterError::Kubeconfig(format!("{}: {}", path.display(), e))
                })?;
                let config = Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| ClusterError::Kubeconfig(e.to_string()))?;
                Client::try_from(config).map_err(|e| ClusterError::Connection(e.to_string()))?
            }
            None => {
                Client::try_default().await.map_err(|e| ClusterError::Connection(e.to_string()))?
            }
        };
        Ok(Arc::new(KubeClusterAdapter::new(
            client,
            kubeconfig.map(Path::to_path_buf),
            self.kubectl_bin.clone(),
        )))
    }
}
