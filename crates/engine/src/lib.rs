// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kx-engine: remediation workflows and cluster scans

pub mod audit;
pub mod cluster;
mod error;
pub mod gate;
pub mod orchestrator;
pub mod registry;
pub mod scan;

pub use audit::{AuditSink, ChainAuditSink};
pub use cluster::{connect_cluster, ClusterHandle, ClusterRegistry};
pub use error::{ScanError, WorkflowError};
pub use gate::GateDecision;
pub use orchestrator::{Orchestrator, OrchestratorConfig, WorkflowDeps};
pub use registry::Registry;
pub use scan::{ScanConfig, ScanDeps, ScanEngine, NO_CHANGES_SUMMARY};

#[cfg(any(test, feature = "test-support"))]
pub use audit::{AuditRecord, FakeAuditSink};
