// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AI Analysis Port

mod chat;

pub use chat::{ChatAnalysisAdapter, ChatConfig, ChatProvider};

use async_trait::async_trait;
use kx_core::{AnalysisResult, Remediation, RemediationRequest, Resource};
use thiserror::Error;

/// Errors from the AI backend
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("ai transport error: {0}")]
    Transport(String),
    #[error("ai backend error: {0}")]
    Backend(String),
    #[error("malformed ai output: {0}")]
    Malformed(String),
}

/// Adapter for AI-backed analysis.
///
/// The two analysis calls never fail: unusable backend output is folded
/// into a degraded [`AnalysisResult`]. Remediation generation does fail,
/// since there is nothing safe to fall back to.
#[async_trait]
pub trait AnalysisAdapter: Clone + Send + Sync + 'static {
    async fn analyze_context(&self, resources: &[Resource], query: &str) -> AnalysisResult;

    async fn analyze_resource(&self, target: &Resource, context: &[Resource]) -> AnalysisResult;

    async fn generate_remediation(
        &self,
        request: &RemediationRequest,
    ) -> Result<Remediation, AnalysisError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{AnalysisCall, FakeAnalysisAdapter};
