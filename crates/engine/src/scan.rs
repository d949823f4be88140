// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster-wide scan engine.
//!
//! A scan fetches every resource once, classifies it, then sends one
//! analysis call per namespace in discovery order. Sessions are persisted
//! after every status change. The pending snapshot is committed only when
//! a session completes, so a stopped or failed scan leaves the committed
//! snapshot untouched.

use crate::audit::AuditSink;
use crate::cluster::{ClusterHandle, ClusterRegistry};
use crate::error::ScanError;
use crate::registry::Registry;
use kx_adapters::AnalysisAdapter;
use kx_core::{
    Clock, Resource, ResourceRef, ResourceSnapshot, ResourceStatus, ScanId, ScanSession,
    ScanStatus, ScanSummary, ScanType, SystemClock, DEFAULT_LOG_CAP,
};
use kx_storage::{ScanState, ScanStore, StoreError};
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const NO_CHANGES_SUMMARY: &str = "No changes detected or no resources found matching filters.";

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub fetch_timeout: Duration,
    pub log_cap: usize,
    /// Listed for display but never analyzed
    pub ignored_namespaces: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(60),
            log_cap: DEFAULT_LOG_CAP,
            ignored_namespaces: Vec::new(),
        }
    }
}

impl ScanConfig {
    kx_core::setters! {
        set {
            fetch_timeout: Duration,
            log_cap: usize,
            ignored_namespaces: Vec<String>,
        }
    }
}

pub struct ScanDeps<A> {
    pub analysis: A,
    pub clusters: ClusterRegistry,
    pub store: Arc<ScanStore>,
    pub audit: Arc<dyn AuditSink>,
}

/// Handles for a running scan task.
#[derive(Clone)]
struct RunningScan {
    cancel: CancellationToken,
    /// Cancelled by the task itself once its final state is persisted
    done: CancellationToken,
}

#[derive(Clone)]
pub struct ScanEngine<A, K = SystemClock> {
    sessions: Registry<ScanId, ScanSession>,
    snapshots: Registry<String, ResourceSnapshot>,
    running: Registry<ScanId, RunningScan>,
    clusters: ClusterRegistry,
    analysis: A,
    store: Arc<ScanStore>,
    audit: Arc<dyn AuditSink>,
    clock: K,
    config: Arc<ScanConfig>,
    persist_lock: Arc<Mutex<()>>,
}

impl<A: AnalysisAdapter, K: Clock> ScanEngine<A, K> {
    /// Build an engine over previously persisted state.
    pub fn new(deps: ScanDeps<A>, state: ScanState, clock: K, config: ScanConfig) -> Self {
        Self {
            sessions: Registry::from_map(state.sessions),
            snapshots: Registry::from_map(state.snapshots),
            running: Registry::new(),
            clusters: deps.clusters,
            analysis: deps.analysis,
            store: deps.store,
            audit: deps.audit,
            clock,
            config: Arc::new(config),
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn start(
        &self,
        cluster_id: &str,
        scan_type: ScanType,
        filters: Vec<String>,
    ) -> Result<ScanId, ScanError> {
        let cluster = self
            .clusters
            .get(cluster_id)
            .ok_or_else(|| ScanError::ClusterNotFound(cluster_id.to_string()))?;

        let id = ScanId::new();
        let now = self.clock.epoch_ms();
        let mut session =
            ScanSession::new(id.clone(), cluster_id, scan_type, filters, self.config.log_cap, now);
        session.log.push(now, format!("Initializing {scan_type} cluster scan..."));
        self.sessions.insert(id.clone(), session);

        let run = RunningScan { cancel: CancellationToken::new(), done: CancellationToken::new() };
        self.running.insert(id.clone(), run.clone());
        tracing::info!(scan_id = %id, cluster_id, %scan_type, "scan started");

        let this = self.clone();
        let run_id = id.clone();
        tokio::spawn(async move { this.run(run_id, cluster, run).await });
        Ok(id)
    }

    pub fn status(&self, id: &ScanId) -> Option<ScanSession> {
        self.sessions.get(id)
    }

    /// Summaries of every session, newest first.
    pub fn list(&self) -> Vec<ScanSummary> {
        let mut summaries: Vec<_> = self.sessions.values().iter().map(ScanSession::summary).collect();
        summaries.sort_by(|a, b| {
            b.created_at_ms.cmp(&a.created_at_ms).then_with(|| b.id.cmp(&a.id))
        });
        summaries
    }

    /// Cancel a running scan and wait until it has settled as `stopped`.
    ///
    /// Stopping a scan that already finished is a no-op.
    pub async fn stop(&self, id: &ScanId) -> Result<(), ScanError> {
        if !self.sessions.contains(id) {
            return Err(ScanError::NotFound(id.clone()));
        }
        if let Some(run) = self.running.get(id) {
            run.cancel.cancel();
            run.done.cancelled().await;
        }
        Ok(())
    }

    /// Cancel every running scan, then drop all sessions and snapshots.
    pub async fn clear_cache(&self) {
        let running = self.running.values();
        for run in &running {
            run.cancel.cancel();
        }
        for run in &running {
            run.done.cancelled().await;
        }
        self.sessions.clear();
        self.snapshots.clear();
        self.persist_sessions().await;
        self.persist_snapshots().await;
        tracing::info!("scan cache and resource snapshots cleared");
    }

    /// Committed snapshot for `cluster_id`, if any.
    pub fn snapshot(&self, cluster_id: &str) -> Option<ResourceSnapshot> {
        self.snapshots.get(cluster_id)
    }

    async fn run(self, id: ScanId, cluster: ClusterHandle, run: RunningScan) {
        self.persist_sessions().await;
        let outcome = self.execute(&id, &cluster, &run.cancel).await;
        let now = self.clock.epoch_ms();
        match outcome {
            Ok(()) => {}
            Err(ScanError::Cancelled) => {
                self.log(&id, "Scan stopped by user.");
                self.sessions.update(&id, |s| s.finish(ScanStatus::Stopped, now));
            }
            Err(e) => {
                tracing::warn!(scan_id = %id, error = %e, "scan failed");
                self.log(&id, format!("Scan failed: {e}"));
                self.sessions.update(&id, |s| s.finish(ScanStatus::Failed, now));
            }
        }
        self.persist_sessions().await;
        self.running.remove(&id);
        run.done.cancel();
    }

    async fn execute(
        &self,
        id: &ScanId,
        cluster: &ClusterHandle,
        cancel: &CancellationToken,
    ) -> Result<(), ScanError> {
        let Some(session) = self.sessions.get(id) else {
            return Err(ScanError::NotFound(id.clone()));
        };

        self.set_status(id, ScanStatus::FetchingResources).await;
        self.log(id, "Fetching all cluster resources...");
        let fetch = tokio::time::timeout(self.config.fetch_timeout, cluster.adapter.list_resources(None));
        let all = match cancellable(cancel, fetch).await? {
            Ok(listed) => listed?,
            Err(_) => return Err(ScanError::FetchTimeout(self.config.fetch_timeout)),
        };
        self.log(id, format!("Fetched {} total resources.", all.len()));

        let previous = self.snapshots.get(&cluster.id).unwrap_or_default();
        let plan = classify(&session, all, &previous, &self.config.ignored_namespaces);
        match session.scan_type {
            ScanType::Smart => self.log(
                id,
                format!(
                    "Smart scan: {}/{} resources selected ({} skipped).",
                    plan.queued.len(),
                    plan.fetched,
                    plan.skipped
                ),
            ),
            ScanType::Full => self.log(id, format!("Full scan: {} resources queued.", plan.queued.len())),
        }

        let total = plan.queued.len();
        let mut pending = plan.snapshot;
        self.sessions.update(id, |s| {
            s.resources_list = plan.listed;
            s.resource_status = plan.statuses;
            s.total_queued = total;
            s.snapshot_pending = Some(pending.clone());
        });

        if total == 0 {
            self.log(id, "No resources to analyze.");
            self.complete(id, &cluster.id, NO_CHANGES_SUMMARY.to_string()).await;
            self.record_completion(id, cluster, session.scan_type).await;
            return Ok(());
        }

        self.set_status(id, ScanStatus::Analyzing).await;
        for (namespace, batch) in group_by_namespace(plan.queued) {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let failed = self.analyze_batch(id, &namespace, &batch, cancel).await?;
            if failed {
                for r in &batch {
                    pending.remove(&r.unique_id);
                }
            }
            let status = if failed { ResourceStatus::Error } else { ResourceStatus::Analyzed };
            self.sessions.update(id, |s| {
                for r in &batch {
                    s.resource_status.insert(r.unique_id.clone(), status);
                }
                s.analyzed_count += batch.len();
                s.update_progress();
                s.snapshot_pending = Some(pending.clone());
            });
            self.persist_sessions().await;
            cancellable(cancel, tokio::task::yield_now()).await?;
        }

        let issues = self.sessions.get(id).map_or(0, |s| s.issues.len());
        self.log(id, "Analysis passed. Generating final summary...");
        self.complete(
            id,
            &cluster.id,
            format!("Scan complete. Found {issues} issues across {total} resources."),
        )
        .await;
        self.record_completion(id, cluster, session.scan_type).await;
        Ok(())
    }

    /// Analyze one namespace; returns whether the batch failed.
    async fn analyze_batch(
        &self,
        id: &ScanId,
        namespace: &str,
        batch: &[Resource],
        cancel: &CancellationToken,
    ) -> Result<bool, ScanError> {
        let mut kinds: Vec<(&str, usize)> = Vec::new();
        for r in batch {
            self.log(id, format!("Analyzing {}/{}...", r.kind, r.name));
            match kinds.iter_mut().find(|(k, _)| *k == r.kind) {
                Some((_, n)) => *n += 1,
                None => kinds.push((r.kind.as_str(), 1)),
            }
        }
        let counts: Vec<String> = kinds.iter().map(|(k, n)| format!("{k}: {n}")).collect();
        self.log(id, format!("Namespace '{namespace}' Summary: {}", counts.join(", ")));

        let query = format!(
            "Analyze every single provided resource in namespace '{namespace}'. Detect security \
             risks, misconfigurations, and specific issues for each resource."
        );
        let started = Instant::now();
        let result = cancellable(cancel, self.analysis.analyze_context(batch, &query)).await?;

        if result.degraded {
            self.log(id, format!("Error analyzing namespace {namespace}: {}", result.summary));
            return Ok(true);
        }
        self.log(
            id,
            format!(
                "AI analysis completed for {namespace} in {:.1}s",
                started.elapsed().as_secs_f64()
            ),
        );
        if result.issues.is_empty() {
            self.log(id, format!("No issues detected in {namespace}."));
        } else {
            self.log(id, format!("AI detected {} issues in {namespace}:", result.issues.len()));
            for issue in &result.issues {
                self.log(id, format!("  - [{}] {}", issue.severity, issue.title));
            }
            self.sessions.update(id, |s| s.issues.extend(result.issues));
        }
        Ok(false)
    }

    /// Mark completed and commit the pending snapshot in one step.
    async fn complete(&self, id: &ScanId, cluster_id: &str, summary: String) {
        let now = self.clock.epoch_ms();
        let pending = self.sessions.update(id, |s| {
            s.summary = summary;
            s.progress = 100;
            let pending = s.snapshot_pending.take();
            s.finish(ScanStatus::Completed, now);
            pending
        });
        if let Some(Some(snapshot)) = pending {
            self.snapshots.insert(cluster_id.to_string(), snapshot);
            self.persist_snapshots().await;
        }
        self.log(id, "Scan completed successfully.");
        self.persist_sessions().await;
        tracing::info!(scan_id = %id, cluster_id, "scan completed");
    }

    async fn record_completion(&self, id: &ScanId, cluster: &ClusterHandle, scan_type: ScanType) {
        let Some(session) = self.sessions.get(id) else { return };
        let details = json!({
            "scan_id": id.as_str(),
            "cluster_id": cluster.id,
            "scan_type": scan_type,
            "total_issues": session.issues.len(),
            "resources_analyzed": session.analyzed_count,
        });
        if let Err(e) = self.audit.record("system", "scan_completed", details).await {
            tracing::error!(scan_id = %id, error = %e, "audit record failed");
            self.log(id, format!("Warning: audit record failed: {e}"));
            self.persist_sessions().await;
        }
    }

    async fn set_status(&self, id: &ScanId, status: ScanStatus) {
        self.sessions.update(id, |s| s.status = status);
        self.persist_sessions().await;
    }

    fn log(&self, id: &ScanId, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(scan_id = %id, "{message}");
        let now = self.clock.epoch_ms();
        self.sessions.update(id, |s| s.log.push(now, message));
    }

    /// Write the session document on the blocking pool.
    ///
    /// The persist lock is held from the snapshot until the write lands, so
    /// documents reach disk in the order their snapshots were taken.
    async fn persist_sessions(&self) {
        let _guard = self.persist_lock.lock().await;
        let sessions = self.sessions.snapshot();
        let store = Arc::clone(&self.store);
        let saved = tokio::task::spawn_blocking(move || store.save_sessions(&sessions)).await;
        log_persist_failure("scan sessions", saved);
    }

    async fn persist_snapshots(&self) {
        let _guard = self.persist_lock.lock().await;
        let snapshots = self.snapshots.snapshot();
        let store = Arc::clone(&self.store);
        let saved = tokio::task::spawn_blocking(move || store.save_snapshots(&snapshots)).await;
        log_persist_failure("resource snapshots", saved);
    }
}

fn log_persist_failure(
    document: &str,
    saved: Result<Result<(), StoreError>, tokio::task::JoinError>,
) {
    match saved {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "failed to persist {document}"),
        Err(e) => tracing::error!(error = %e, "persist task for {document} failed"),
    }
}

/// Resolve `fut` unless `cancel` fires first.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, ScanError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScanError::Cancelled),
        out = fut => Ok(out),
    }
}

struct ScanPlan {
    fetched: usize,
    skipped: usize,
    listed: Vec<ResourceRef>,
    statuses: HashMap<String, ResourceStatus>,
    queued: Vec<Resource>,
    /// Version tokens to commit if the scan completes
    snapshot: ResourceSnapshot,
}

fn classify(
    session: &ScanSession,
    resources: Vec<Resource>,
    previous: &ResourceSnapshot,
    ignored_namespaces: &[String],
) -> ScanPlan {
    let mut plan = ScanPlan {
        fetched: resources.len(),
        skipped: 0,
        listed: Vec::new(),
        statuses: HashMap::new(),
        queued: Vec::new(),
        snapshot: ResourceSnapshot::new(),
    };
    for r in resources {
        if !session.accepts_kind(&r.kind) {
            continue;
        }
        plan.listed.push(ResourceRef::from(&r));
        if ignored_namespaces.contains(&r.namespace) {
            plan.statuses.insert(r.unique_id.clone(), ResourceStatus::Ignored);
            continue;
        }
        let token = r.version_token().to_string();
        plan.snapshot.insert(r.unique_id.clone(), token.clone());
        if session.scan_type == ScanType::Smart && previous.get(&r.unique_id) == Some(&token) {
            plan.skipped += 1;
            plan.statuses.insert(r.unique_id.clone(), ResourceStatus::Analyzed);
            continue;
        }
        plan.statuses.insert(r.unique_id.clone(), ResourceStatus::Pending);
        plan.queued.push(r);
    }
    plan
}

/// Group resources by namespace, namespaces in first-seen order.
fn group_by_namespace(resources: Vec<Resource>) -> Vec<(String, Vec<Resource>)> {
    let mut groups: Vec<(String, Vec<Resource>)> = Vec::new();
    for r in resources {
        match groups.iter_mut().find(|(ns, _)| *ns == r.namespace) {
            Some((_, batch)) => batch.push(r),
            None => groups.push((r.namespace.clone(), vec![r])),
        }
    }
    groups
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
