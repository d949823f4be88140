// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kx-core: domain types shared by the Kortex remediation daemon

pub mod macros;

pub mod analysis;
pub mod clock;
pub mod id;
pub mod resource;
pub mod scan;
pub mod shadow;
pub mod workflow;

pub use analysis::{
    ActionType, AnalysisResult, Issue, IssueCategory, Remediation, RemediationRequest, Severity,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::short;
pub use resource::{unique_id, Resource, DEFAULT_NAMESPACE};
#[cfg(any(test, feature = "test-support"))]
pub use resource::ResourceBuilder;
pub use scan::{
    progress_percent, LogLine, ResourceRef, ResourceSnapshot, ResourceStatus, ScanId, ScanLog,
    ScanSession, ScanStatus, ScanSummary, ScanType, DEFAULT_LOG_CAP,
};
pub use shadow::{ShadowEnvId, ShadowEnvironment, SourceCluster};
pub use workflow::{TransitionError, Workflow, WorkflowId, WorkflowStatus};
