// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remediation workflow record and its phase state machine

use crate::analysis::{AnalysisResult, Remediation};
use crate::shadow::ShadowEnvId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a remediation workflow.
    pub struct WorkflowId("wfl-");
}

/// Workflow phases in their fixed execution order, plus `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initializing,
    CreatingShadow,
    Analyzing,
    ApplyingShadow,
    ValidatingShadow,
    ApplyingReal,
    ValidatingReal,
    Completed,
    Failed,
}

crate::simple_display! {
    WorkflowStatus {
        Initializing => "initializing",
        CreatingShadow => "creating_shadow",
        Analyzing => "analyzing",
        ApplyingShadow => "applying_shadow",
        ValidatingShadow => "validating_shadow",
        ApplyingReal => "applying_real",
        ValidatingReal => "validating_real",
        Completed => "completed",
        Failed => "failed",
    }
}

impl WorkflowStatus {
    /// The successor in the phase order; `None` for terminal states.
    pub fn next(&self) -> Option<WorkflowStatus> {
        use WorkflowStatus::*;
        match self {
            Initializing => Some(CreatingShadow),
            CreatingShadow => Some(Analyzing),
            Analyzing => Some(ApplyingShadow),
            ApplyingShadow => Some(ValidatingShadow),
            ValidatingShadow => Some(ApplyingReal),
            ApplyingReal => Some(ValidatingReal),
            ValidatingReal => Some(Completed),
            Completed | Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("workflow already {0}")]
    Terminal(WorkflowStatus),
    #[error("cannot move from {from} to {to}")]
    OutOfOrder { from: WorkflowStatus, to: WorkflowStatus },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub cluster_id: String,
    pub resource_id: String,
    pub issue_text: String,
    pub status: WorkflowStatus,
    pub step_log: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_env_id: Option<ShadowEnvId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_analysis: Option<AnalysisResult>,
    /// Every status entered, in order.
    pub history: Vec<WorkflowStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Workflow {
    pub fn new(
        id: WorkflowId,
        cluster_id: impl Into<String>,
        resource_id: impl Into<String>,
        issue_text: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            cluster_id: cluster_id.into(),
            resource_id: resource_id.into(),
            issue_text: issue_text.into(),
            status: WorkflowStatus::Initializing,
            step_log: vec!["Workflow initialized. Starting process...".to_string()],
            shadow_env_id: None,
            remediation: None,
            final_analysis: None,
            history: vec![WorkflowStatus::Initializing],
            error: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Move to `to`, which must be the immediate successor of the current
    /// status (or `Failed` from any non-terminal status).
    pub fn advance(&mut self, to: WorkflowStatus, now_ms: u64) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }
        if to != WorkflowStatus::Failed && self.status.next() != Some(to) {
            return Err(TransitionError::OutOfOrder { from: self.status, to });
        }
        self.status = to;
        self.history.push(to);
        self.updated_at_ms = now_ms;
        Ok(())
    }

    /// Record the error, append a diagnostic line and enter `Failed`.
    pub fn fail(&mut self, error: impl Into<String>, now_ms: u64) -> Result<(), TransitionError> {
        let error = error.into();
        self.advance(WorkflowStatus::Failed, now_ms)?;
        self.step_log.push(format!("Workflow failed: {error}"));
        self.error = Some(error);
        Ok(())
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.step_log.push(line.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
