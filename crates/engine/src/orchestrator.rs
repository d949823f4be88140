// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shadow-validated remediation workflow.
//!
//! Each workflow runs as its own task through a fixed phase order. The
//! shadow environment obtained in the first phase is held by the task and
//! destroyed once, after the phases end and before the terminal status is
//! published, whichever way the phases ended.
//!
//! [`Orchestrator::shutdown`] interrupts every in-flight workflow between
//! phases and waits until each has torn down its shadow environment.

use crate::audit::AuditSink;
use crate::cluster::{ClusterHandle, ClusterRegistry};
use crate::error::WorkflowError;
use crate::gate;
use crate::registry::Registry;
use kx_adapters::{AnalysisAdapter, ClusterAdapter, ClusterConnector, ShadowAdapter};
use kx_core::{
    Clock, Remediation, RemediationRequest, Resource, ShadowEnvironment, SystemClock, Workflow, WorkflowId,
    WorkflowStatus,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SHADOW_VALIDATION_QUERY: &str =
    "Check if the specific issue is resolved and ensure no new vulnerabilities are introduced.";

/// Timing knobs for the workflow phases.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Connection checks against a fresh shadow environment before giving up
    pub connect_attempts: u32,
    pub connect_interval: Duration,
    /// Wait before each validation phase so applied changes can settle
    pub settle_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 10,
            connect_interval: Duration::from_secs(2),
            settle_delay: Duration::from_secs(5),
        }
    }
}

impl OrchestratorConfig {
    kx_core::setters! {
        set {
            connect_attempts: u32,
            connect_interval: Duration,
            settle_delay: Duration,
        }
    }
}

/// Collaborators the orchestrator drives.
pub struct WorkflowDeps<S, A, C> {
    pub workflows: Registry<WorkflowId, Workflow>,
    pub shadows: S,
    pub analysis: A,
    pub connector: C,
    pub clusters: ClusterRegistry,
    pub audit: Arc<dyn AuditSink>,
}

#[derive(Clone)]
pub struct Orchestrator<S, A, C, K = SystemClock> {
    workflows: Registry<WorkflowId, Workflow>,
    /// Done tokens of workflows whose task has not finished
    running: Registry<WorkflowId, CancellationToken>,
    shutdown: CancellationToken,
    clusters: ClusterRegistry,
    shadows: S,
    analysis: A,
    connector: C,
    audit: Arc<dyn AuditSink>,
    clock: K,
    config: OrchestratorConfig,
}

impl<S, A, C, K> Orchestrator<S, A, C, K>
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
    K: Clock,
{
    pub fn new(deps: WorkflowDeps<S, A, C>, clock: K, config: OrchestratorConfig) -> Self {
        Self {
            workflows: deps.workflows,
            running: Registry::new(),
            shutdown: CancellationToken::new(),
            clusters: deps.clusters,
            shadows: deps.shadows,
            analysis: deps.analysis,
            connector: deps.connector,
            audit: deps.audit,
            clock,
            config,
        }
    }

    /// Register a workflow and run it in the background.
    pub fn start(
        &self,
        cluster_id: &str,
        resource_id: &str,
        issue_text: &str,
    ) -> Result<WorkflowId, WorkflowError> {
        if self.shutdown.is_cancelled() {
            return Err(WorkflowError::Interrupted);
        }
        let source = self
            .clusters
            .get(cluster_id)
            .ok_or_else(|| WorkflowError::ClusterNotFound(cluster_id.to_string()))?;

        let id = WorkflowId::new();
        let workflow =
            Workflow::new(id.clone(), cluster_id, resource_id, issue_text, self.clock.epoch_ms());
        self.workflows.insert(id.clone(), workflow);
        let done = CancellationToken::new();
        self.running.insert(id.clone(), done.clone());
        tracing::info!(workflow_id = %id, cluster_id, resource_id, "workflow started");

        let this = self.clone();
        let run_id = id.clone();
        tokio::spawn(async move {
            this.run(&run_id, source).await;
            this.running.remove(&run_id);
            done.cancel();
        });
        Ok(id)
    }

    pub fn status(&self, id: &WorkflowId) -> Option<Workflow> {
        self.workflows.get(id)
    }

    /// Refuse new workflows, interrupt running ones, and wait until each
    /// has destroyed its shadow environment and settled.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let running = self.running.values();
        if !running.is_empty() {
            tracing::info!(count = running.len(), "waiting for in-flight workflows to clean up");
        }
        for done in running {
            done.cancelled().await;
        }
    }

    async fn run(&self, id: &WorkflowId, source: ClusterHandle) {
        let mut shadow = None;
        let outcome = self.execute(id, &source, &mut shadow).await;

        if let Some(env) = shadow.take() {
            self.log(id, format!("Automatic cleanup: destroying shadow environment {}...", env.id));
            self.shadows.destroy(&env.id).await;
            self.log(id, "Shadow environment destroyed.");
        }

        let now = self.clock.epoch_ms();
        let transition = self.workflows.update(id, |wf| match &outcome {
            Ok(()) => {
                wf.log("Process finished successfully.");
                wf.advance(WorkflowStatus::Completed, now)
            }
            Err(e) => wf.fail(e.to_string(), now),
        });
        if let Some(Err(e)) = transition {
            tracing::error!(workflow_id = %id, error = %e, "invalid terminal transition");
        }
        match outcome {
            Ok(()) => tracing::info!(workflow_id = %id, "workflow completed"),
            Err(e) => tracing::warn!(workflow_id = %id, error = %e, "workflow failed"),
        }
    }

    async fn execute(
        &self,
        id: &WorkflowId,
        source: &ClusterHandle,
        shadow: &mut Option<ShadowEnvironment>,
    ) -> Result<(), WorkflowError> {
        self.enter(id, WorkflowStatus::CreatingShadow, "Creating shadow environment...");
        let env = self.shadows.create(&source.source()).await?;
        *shadow = Some(env.clone());
        self.workflows.update(id, |wf| wf.shadow_env_id = Some(env.id.clone()));
        self.log(id, format!("Shadow environment {} created with isolation.", env.id));

        // Shutdown interrupts only the shadow phases; creation and promotion
        // always run to completion.
        let (resource, remediation) = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                self.log(id, "Daemon shutting down; abandoning remediation.");
                Err(WorkflowError::Interrupted)
            }
            validated = self.validate_in_shadow(id, source, &env) => validated,
        }?;
        self.promote(id, source, &resource, &remediation).await
    }

    /// Generate a remediation and prove it in the shadow environment.
    async fn validate_in_shadow(
        &self,
        id: &WorkflowId,
        source: &ClusterHandle,
        env: &ShadowEnvironment,
    ) -> Result<(Resource, Remediation), WorkflowError> {
        let (resource_id, issue_text) = self
            .workflows
            .get(id)
            .map(|wf| (wf.resource_id, wf.issue_text))
            .unwrap_or_default();

        let shadow_cluster = self
            .connector
            .connect(Some(&env.kubeconfig_path))
            .await
            .map_err(|e| WorkflowError::Provisioning(e.to_string()))?;
        self.await_connection(id, shadow_cluster.as_ref()).await?;

        self.enter(id, WorkflowStatus::Analyzing, "Analyzing resource and generating remediation...");
        let resource = self.fetch_target(source, &resource_id).await?;
        let remediation = self
            .analysis
            .generate_remediation(&RemediationRequest {
                resource: resource.clone(),
                issue: issue_text,
            })
            .await?;
        self.log(id, format!("Remediation generated: {}", remediation.description));
        self.workflows.update(id, |wf| wf.remediation = Some(remediation.clone()));

        self.enter(id, WorkflowStatus::ApplyingShadow, "Applying remediation to shadow environment...");
        shadow_cluster
            .apply_manifest(&remediation.manifest, &resource.namespace)
            .await
            .map_err(|e| WorkflowError::Apply { target: "shadow environment", source: e })?;
        self.log(id, "Remediation applied to shadow environment.");

        self.enter(id, WorkflowStatus::ValidatingShadow, "Validating remediation in shadow environment...");
        tokio::time::sleep(self.config.settle_delay).await;
        let shadow_resources = shadow_cluster
            .list_resources(None)
            .await
            .map_err(|e| WorkflowError::Connection(e.to_string()))?;
        if !shadow_resources.iter().any(|r| r.kind == resource.kind && r.name == resource.name) {
            self.log(id, "Warning: resource not found in shadow environment after apply.");
        }
        let validation =
            self.analysis.analyze_context(&shadow_resources, SHADOW_VALIDATION_QUERY).await;
        self.log(id, format!("Shadow safety analysis: {}", validation.summary));
        let decision = gate::evaluate(&validation);
        if let Some(discrepancy) = decision.discrepancy {
            tracing::warn!(workflow_id = %id, "{discrepancy}");
            self.log(id, discrepancy);
        }
        if !decision.passed {
            self.log(id, "Shadow validation flagged potential issues. Aborting real deployment.");
            return Err(WorkflowError::ValidationRejected(decision.reasons.join("; ")));
        }
        self.log(id, "Shadow validation passed. Proceeding to real cluster...");
        Ok((resource, remediation))
    }

    async fn promote(
        &self,
        id: &WorkflowId,
        source: &ClusterHandle,
        resource: &Resource,
        remediation: &Remediation,
    ) -> Result<(), WorkflowError> {
        self.enter(id, WorkflowStatus::ApplyingReal, "Applying remediation to real cluster...");
        source
            .adapter
            .apply_manifest(&remediation.manifest, &resource.namespace)
            .await
            .map_err(|e| WorkflowError::Apply { target: "real cluster", source: e })?;
        self.log(id, "Remediation applied to real cluster.");
        let details = json!({
            "workflow_id": id.as_str(),
            "cluster_id": source.id,
            "resource_id": resource.unique_id,
            "action_type": remediation.action_type,
            "description": remediation.description,
        });
        if let Err(e) = self.audit.record("system", "remediation_applied", details).await {
            tracing::error!(workflow_id = %id, error = %e, "audit record failed");
            self.log(id, format!("Warning: audit record failed: {e}"));
        }

        self.enter(id, WorkflowStatus::ValidatingReal, "Running final validation...");
        tokio::time::sleep(self.config.settle_delay).await;
        self.final_validation(id, source, resource).await;
        Ok(())
    }

    async fn await_connection(
        &self,
        id: &WorkflowId,
        cluster: &dyn ClusterAdapter,
    ) -> Result<(), WorkflowError> {
        for attempt in 0..self.config.connect_attempts {
            if cluster.check_connection().await {
                self.log(id, "Shadow environment connected.");
                return Ok(());
            }
            if attempt + 1 < self.config.connect_attempts {
                self.log(id, "Waiting for shadow environment connectivity...");
                tokio::time::sleep(self.config.connect_interval).await;
            }
        }
        Err(WorkflowError::Provisioning(format!(
            "shadow environment unreachable after {} connection checks",
            self.config.connect_attempts
        )))
    }

    async fn fetch_target(
        &self,
        source: &ClusterHandle,
        resource_id: &str,
    ) -> Result<Resource, WorkflowError> {
        let not_found = || WorkflowError::ResourceNotFound(resource_id.to_string());
        let (kind, namespace, name) = split_resource_id(resource_id).ok_or_else(not_found)?;
        source
            .adapter
            .get_resource(kind, name, namespace)
            .await
            .map_err(|e| WorkflowError::Connection(e.to_string()))?
            .ok_or_else(not_found)
    }

    /// Advisory post-apply analysis; never fails the workflow.
    async fn final_validation(&self, id: &WorkflowId, source: &ClusterHandle, resource: &Resource) {
        let refreshed = source.adapter.get_resource(&resource.kind, &resource.name, &resource.namespace);
        let target = match refreshed.await {
            Ok(Some(r)) => r,
            Ok(None) => {
                self.log(id, "Warning: target resource missing after apply; skipping final analysis.");
                return;
            }
            Err(e) => {
                self.log(id, format!("Warning: final fetch failed: {e}"));
                return;
            }
        };
        let context = match source.adapter.list_resources(Some(std::slice::from_ref(&target.namespace))).await {
            Ok(resources) => resources,
            Err(e) => {
                self.log(id, format!("Warning: could not list context for final analysis: {e}"));
                Vec::new()
            }
        };
        let analysis = self.analysis.analyze_resource(&target, &context).await;
        self.workflows.update(id, |wf| wf.final_analysis = Some(analysis));
        self.log(id, "Detailed post-fix analysis complete.");
    }

    fn enter(&self, id: &WorkflowId, status: WorkflowStatus, line: &str) {
        let now = self.clock.epoch_ms();
        let transition = self.workflows.update(id, |wf| {
            let result = wf.advance(status, now);
            wf.log(line);
            result
        });
        if let Some(Err(e)) = transition {
            tracing::error!(workflow_id = %id, error = %e, "invalid phase transition");
        }
        tracing::info!(workflow_id = %id, %status, "{line}");
    }

    fn log(&self, id: &WorkflowId, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(workflow_id = %id, "{line}");
        self.workflows.update(id, |wf| wf.log(line));
    }
}

/// Split `kind/namespace/name`.
fn split_resource_id(id: &str) -> Option<(&str, &str, &str)> {
    let mut parts = id.splitn(3, '/');
    let kind = parts.next().filter(|s| !s.is_empty())?;
    let namespace = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    Some((kind, namespace, name))
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
