// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use kx_adapters::{AnalysisError, ClusterError, ShadowError};
use kx_core::ScanId;
use std::time::Duration;
use thiserror::Error;

/// Why a remediation workflow failed.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("cluster {0} is not connected")]
    ClusterNotFound(String),
    #[error("cluster connection error: {0}")]
    Connection(String),
    #[error("shadow provisioning failed: {0}")]
    Provisioning(String),
    #[error("resource {0} not found in target cluster")]
    ResourceNotFound(String),
    #[error("remediation generation failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("apply to {target} failed: {source}")]
    Apply { target: &'static str, source: ClusterError },
    #[error("shadow validation rejected promotion: {0}")]
    ValidationRejected(String),
    #[error("interrupted by daemon shutdown")]
    Interrupted,
}

impl From<ShadowError> for WorkflowError {
    fn from(e: ShadowError) -> Self {
        WorkflowError::Provisioning(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan {0} not found")]
    NotFound(ScanId),
    #[error("cluster {0} not found or disconnected")]
    ClusterNotFound(String),
    #[error("Timed out after {}s fetching resources from the cluster API", .0.as_secs())]
    FetchTimeout(Duration),
    #[error("cluster connection error: {0}")]
    Connection(#[from] ClusterError),
    #[error("scan cancelled")]
    Cancelled,
}
