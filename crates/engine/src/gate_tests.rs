// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kx_core::{Issue, IssueCategory, Severity};

fn issue(severity: Severity) -> Issue {
    Issue {
        severity,
        category: IssueCategory::Security,
        title: "privileged container".to_string(),
        description: String::new(),
        remediation_suggestion: None,
        affected_resource_ids: vec![],
        documentation_reference: None,
    }
}

#[yare::parameterized(
    clean          = { "No significant risk detected.", vec![], true, false },
    low_issue      = { "Minor findings only.", vec![Severity::Low, Severity::Medium], true, false },
    high_both      = { "One HIGH severity problem remains.", vec![Severity::High], false, false },
    narrative_only = { "Critical exposure found.", vec![], false, true },
    issues_only    = { "Looks fine.", vec![Severity::Critical], false, true },
    highlight_word = { "Highlights: nothing notable.", vec![], true, false },
)]
fn gate_decision(summary: &str, severities: Vec<Severity>, passed: bool, discrepancy: bool) {
    let result = AnalysisResult::new(summary, severities.into_iter().map(issue).collect());
    let decision = evaluate(&result);
    assert_eq!(decision.passed, passed);
    assert_eq!(decision.discrepancy.is_some(), discrepancy);
    assert_eq!(decision.reasons.is_empty(), passed);
}

#[test]
fn degraded_result_never_passes() {
    let decision = evaluate(&AnalysisResult::degraded("timeout"));
    assert!(!decision.passed);
    assert!(decision.reasons[0].contains("Analysis failed: timeout"));
    assert_eq!(decision.discrepancy, None);
}

#[test]
fn reasons_name_blocking_issues() {
    let result = AnalysisResult::new("high risk", vec![issue(Severity::High), issue(Severity::Low)]);
    let decision = evaluate(&result);
    assert_eq!(
        decision.reasons,
        vec!["[HIGH] privileged container".to_string(), "summary signals high-severity risk".to_string()]
    );
}
