// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use kx_core::{
    AnalysisResult, ResourceRef, ScanId, ScanSession, ScanSummary, Workflow, WorkflowId,
};
use kx_storage::{AuditEntry, VerifyReport};
use serde::{Deserialize, Serialize};

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Daemon is shutting down
    ShuttingDown,

    /// Error response
    Error { message: String },

    ClusterConnected { cluster_id: String },

    Resources { resources: Vec<ResourceRef> },

    Analysis { result: Box<AnalysisResult> },

    ScanStarted { id: ScanId },

    /// Single scan session, `None` when the id is unknown
    Scan { scan: Option<Box<ScanSession>> },

    /// Scan summaries, newest first
    Scans { scans: Vec<ScanSummary> },

    WorkflowStarted { id: WorkflowId },

    /// Single workflow, `None` when the id is unknown
    Workflow { workflow: Option<Box<Workflow>> },

    AuditReport { report: VerifyReport },

    History { entries: Vec<AuditEntry> },
}

impl Response {
    pub fn error(message: impl std::fmt::Display) -> Self {
        Response::Error { message: message.to_string() }
    }
}
