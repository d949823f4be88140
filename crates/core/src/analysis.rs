// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Analysis results and remediations exchanged with the AI Analysis Port

use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Severities that block promotion to the real cluster.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

crate::simple_display! {
    Severity {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCategory {
    Security,
    Performance,
    Reliability,
    Scalability,
    Cost,
    BestPractice,
}

crate::simple_display! {
    IssueCategory {
        Security => "SECURITY",
        Performance => "PERFORMANCE",
        Reliability => "RELIABILITY",
        Scalability => "SCALABILITY",
        Cost => "COST",
        BestPractice => "BEST_PRACTICE",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Patch,
    Apply,
    Delete,
}

/// A candidate fix produced by the AI backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remediation {
    pub description: String,
    pub action_type: ActionType,
    pub manifest: Value,
    pub target_resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_suggestion: Option<Remediation>,
    #[serde(default)]
    pub affected_resource_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_reference: Option<String>,
}

/// Narrative summary plus structured issues for one analysis call.
///
/// A `degraded` result stands in for backend output that could not be
/// used; callers treat it as advisory only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub degraded: bool,
}

impl AnalysisResult {
    pub fn new(summary: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self { summary: summary.into(), issues, degraded: false }
    }

    pub fn degraded(reason: impl std::fmt::Display) -> Self {
        Self { summary: format!("Analysis failed: {reason}"), issues: Vec::new(), degraded: true }
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    /// Whether the narrative mentions "high" or "critical" as a whole word.
    pub fn narrative_signals_risk(&self) -> bool {
        self.summary
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w.eq_ignore_ascii_case("high") || w.eq_ignore_ascii_case("critical"))
    }
}

/// Input to remediation generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationRequest {
    pub resource: Resource,
    pub issue: String,
}

#[cfg(test)]
#[path = "analysis_tests.rs"]
mod tests;
