// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use WorkflowStatus::*;

const ORDER: [WorkflowStatus; 8] = [
    Initializing,
    CreatingShadow,
    Analyzing,
    ApplyingShadow,
    ValidatingShadow,
    ApplyingReal,
    ValidatingReal,
    Completed,
];

fn workflow() -> Workflow {
    Workflow::new(WorkflowId::new(), "prod", "Deployment/default/web", "oom", 10)
}

#[test]
fn new_workflow_starts_initializing() {
    let wf = workflow();
    assert_eq!(wf.status, Initializing);
    assert_eq!(wf.history, vec![Initializing]);
    assert_eq!(wf.step_log.len(), 1);
    assert!(wf.id.as_str().starts_with("wfl-"));
}

#[test]
fn full_phase_sequence_reaches_completed() {
    let mut wf = workflow();
    for (i, status) in ORDER.iter().skip(1).enumerate() {
        wf.advance(*status, 20 + i as u64).unwrap();
    }
    assert_eq!(wf.status, Completed);
    assert_eq!(wf.history, ORDER.to_vec());
    assert_eq!(wf.updated_at_ms, 26);
}

#[test]
fn skipping_a_phase_is_rejected() {
    let mut wf = workflow();
    wf.advance(CreatingShadow, 1).unwrap();
    let err = wf.advance(ApplyingShadow, 2).unwrap_err();
    assert_eq!(err, TransitionError::OutOfOrder { from: CreatingShadow, to: ApplyingShadow });
    assert_eq!(wf.status, CreatingShadow);
}

#[test]
fn fail_records_error_and_log_line() {
    let mut wf = workflow();
    wf.advance(CreatingShadow, 1).unwrap();
    wf.fail("tunnel timed out", 2).unwrap();
    assert_eq!(wf.status, Failed);
    assert_eq!(wf.error.as_deref(), Some("tunnel timed out"));
    assert_eq!(wf.step_log.last().map(String::as_str), Some("Workflow failed: tunnel timed out"));
}

#[test]
fn terminal_states_reject_further_moves() {
    let mut wf = workflow();
    wf.fail("boom", 1).unwrap();
    assert_eq!(wf.advance(CreatingShadow, 2), Err(TransitionError::Terminal(Failed)));
    assert_eq!(wf.fail("again", 3), Err(TransitionError::Terminal(Failed)));
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&ValidatingShadow).unwrap(), "\"validating_shadow\"");
    assert_eq!(ApplyingReal.to_string(), "applying_real");
}

proptest! {
    #[test]
    fn history_is_monotonic_for_any_attempted_sequence(
        attempts in proptest::collection::vec(0usize..9, 0..30)
    ) {
        let all = [Initializing, CreatingShadow, Analyzing, ApplyingShadow, ValidatingShadow,
                   ApplyingReal, ValidatingReal, Completed, Failed];
        let mut wf = workflow();
        for a in attempts {
            let _ = wf.advance(all[a], 1);
        }
        let ranks: Vec<usize> = wf.history.iter()
            .filter(|s| **s != Failed)
            .map(|s| ORDER.iter().position(|o| o == s).unwrap())
            .collect();
        for pair in ranks.windows(2) {
            prop_assert_eq!(pair[1], pair[0] + 1);
        }
        if wf.status == Completed {
            prop_assert!(wf.history.contains(&ApplyingReal));
        }
    }
}
