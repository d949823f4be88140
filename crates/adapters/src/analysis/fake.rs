// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{AnalysisAdapter, AnalysisError};
use async_trait::async_trait;
use kx_core::{ActionType, AnalysisResult, Issue, Remediation, RemediationRequest, Resource};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Notify;

/// Recorded analysis call
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisCall {
    Context { resource_ids: Vec<String>, query: String },
    Resource { target: String },
    Remediation { resource_id: String, issue: String },
}

#[derive(Default)]
struct FakeAnalysisState {
    calls: Vec<AnalysisCall>,
    context_calls: usize,
    /// Context calls after this many block until released
    hold_after: Option<usize>,
    /// Fixed reply for every context call, overriding per-namespace issues
    context_result: Option<AnalysisResult>,
    namespace_issues: HashMap<String, Vec<Issue>>,
    failing_namespaces: HashSet<String>,
    resource_result: Option<AnalysisResult>,
    remediation_error: Option<String>,
}

/// Scriptable analysis backend for tests
#[derive(Clone, Default)]
pub struct FakeAnalysisAdapter {
    inner: Arc<Mutex<FakeAnalysisState>>,
    release: Arc<Notify>,
}

impl FakeAnalysisAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AnalysisCall> {
        self.inner.lock().calls.clone()
    }

    pub fn context_calls(&self) -> usize {
        self.inner.lock().context_calls
    }

    /// Return `issue` whenever a context batch contains namespace `ns`.
    pub fn add_namespace_issue(&self, ns: &str, issue: Issue) {
        self.inner.lock().namespace_issues.entry(ns.to_string()).or_default().push(issue);
    }

    /// Degrade any context batch that contains namespace `ns`.
    pub fn fail_namespace(&self, ns: &str) {
        self.inner.lock().failing_namespaces.insert(ns.to_string());
    }

    pub fn set_context_result(&self, result: AnalysisResult) {
        self.inner.lock().context_result = Some(result);
    }

    pub fn set_resource_result(&self, result: AnalysisResult) {
        self.inner.lock().resource_result = Some(result);
    }

    pub fn fail_remediation(&self, message: &str) {
        self.inner.lock().remediation_error = Some(message.to_string());
    }

    /// Let the first `n` context calls through; later calls wait for [`Self::release`].
    pub fn hold_after(&self, n: usize) {
        self.inner.lock().hold_after = Some(n);
    }

    pub fn release(&self) {
        self.inner.lock().hold_after = None;
        self.release.notify_waiters();
    }
}

#[async_trait]
impl AnalysisAdapter for FakeAnalysisAdapter {
    async fn analyze_context(&self, resources: &[Resource], query: &str) -> AnalysisResult {
        let notified = self.release.notified();
        let held = {
            let mut state = self.inner.lock();
            state.context_calls += 1;
            state.calls.push(AnalysisCall::Context {
                resource_ids: resources.iter().map(|r| r.unique_id.clone()).collect(),
                query: query.to_string(),
            });
            state.hold_after.is_some_and(|n| state.context_calls > n)
        };
        if held {
            notified.await;
        }

        let state = self.inner.lock();
        if let Some(ref result) = state.context_result {
            return result.clone();
        }
        let namespaces: Vec<&str> = {
            let mut seen = Vec::new();
            for r in resources {
                if !seen.contains(&r.namespace.as_str()) {
                    seen.push(r.namespace.as_str());
                }
            }
            seen
        };
        if namespaces.iter().any(|ns| state.failing_namespaces.contains(*ns)) {
            return AnalysisResult::degraded("injected backend failure");
        }
        let issues: Vec<Issue> = namespaces
            .iter()
            .filter_map(|ns| state.namespace_issues.get(*ns))
            .flatten()
            .cloned()
            .collect();
        AnalysisResult::new("No significant risk detected.", issues)
    }

    async fn analyze_resource(&self, target: &Resource, _context: &[Resource]) -> AnalysisResult {
        let mut state = self.inner.lock();
        state.calls.push(AnalysisCall::Resource { target: target.unique_id.clone() });
        state
            .resource_result
            .clone()
            .unwrap_or_else(|| AnalysisResult::new("Resource looks healthy.", vec![]))
    }

    async fn generate_remediation(
        &self,
        request: &RemediationRequest,
    ) -> Result<Remediation, AnalysisError> {
        let mut state = self.inner.lock();
        state.calls.push(AnalysisCall::Remediation {
            resource_id: request.resource.unique_id.clone(),
            issue: request.issue.clone(),
        });
        if let Some(ref msg) = state.remediation_error {
            return Err(AnalysisError::Malformed(msg.clone()));
        }
        Ok(Remediation {
            description: format!("Fix: {}", request.issue),
            action_type: ActionType::Apply,
            manifest: request.resource.content.clone(),
            target_resource_id: request.resource.unique_id.clone(),
        })
    }
}
