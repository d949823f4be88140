// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use kx_core::{ScanId, ScanType, WorkflowId};
use serde::{Deserialize, Serialize};

/// Request from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Request daemon shutdown
    Shutdown,

    /// Connect (or reconnect) a cluster under `cluster_id`
    ClusterConnect {
        cluster_id: String,
        /// Ambient kubeconfig when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kubeconfig: Option<PathBuf>,
    },

    /// Kinds, names and namespaces of every resource in a connected cluster
    ResourceList { cluster_id: String },

    /// On-demand analysis of one resource, with its cluster as context
    ResourceAnalyze { cluster_id: String, resource_id: String },

    ScanStart {
        cluster_id: String,
        #[serde(default)]
        scan_type: ScanType,
        /// Resource kinds to include; empty means all
        #[serde(default)]
        filters: Vec<String>,
    },

    ScanStatus { id: ScanId },

    ScanList,

    ScanStop { id: ScanId },

    /// Drop every scan session and snapshot, cancelling running scans
    ScanClearCache,

    WorkflowStart { cluster_id: String, resource_id: String, issue: String },

    WorkflowStatus { id: WorkflowId },

    /// Re-verify the audit log against the stored public key
    AuditVerify,

    /// Recent audit entries recorded against a cluster, newest first
    ClusterHistory { cluster_id: String },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
