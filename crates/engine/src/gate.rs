// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Promotion gate between the shadow environment and the real cluster.

use kx_core::AnalysisResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub passed: bool,
    /// Why the gate rejected; empty when it passed.
    pub reasons: Vec<String>,
    /// Set when the narrative and the structured severities disagree.
    pub discrepancy: Option<String>,
}

/// Decide whether a shadow validation result may be promoted.
///
/// Rejects on any HIGH/CRITICAL issue, on a degraded result, or when the
/// summary mentions high or critical risk.
pub fn evaluate(result: &AnalysisResult) -> GateDecision {
    let mut reasons = Vec::new();

    if result.degraded {
        reasons.push(format!("validation analysis unavailable ({})", result.summary));
    }

    let blocking: Vec<_> = result.issues.iter().filter(|i| i.severity.is_blocking()).collect();
    for issue in &blocking {
        reasons.push(format!("[{}] {}", issue.severity, issue.title));
    }

    let narrative = result.narrative_signals_risk();
    if narrative {
        reasons.push("summary signals high-severity risk".to_string());
    }

    let discrepancy = match (narrative, blocking.is_empty()) {
        (true, true) if !result.degraded => Some(
            "Safety gate discrepancy: summary signals high-severity risk but no HIGH/CRITICAL issue was returned."
                .to_string(),
        ),
        (false, false) => Some(format!(
            "Safety gate discrepancy: {} HIGH/CRITICAL issue(s) returned but the summary does not mention them.",
            blocking.len()
        )),
        _ => None,
    };

    GateDecision { passed: reasons.is_empty(), reasons, discrepancy }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
