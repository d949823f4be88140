// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

fn session() -> ScanSession {
    ScanSession::new(ScanId::new(), "prod", ScanType::Smart, vec![], 3, 100)
}

#[test]
fn log_drops_oldest_lines_past_cap() {
    let mut s = session();
    for i in 0..5 {
        s.log.push(i, format!("line {i}"));
    }
    assert_eq!(s.log.len(), 3);
    let msgs: Vec<&str> = s.log.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(msgs, vec!["line 2", "line 3", "line 4"]);
}

#[parameterized(
    empty_queue = { 0, 0, 100 },
    none_done   = { 0, 7, 0 },
    floor       = { 2, 3, 66 },
    all_done    = { 7, 7, 100 },
    overshoot   = { 9, 7, 100 },
)]
fn progress_floors(analyzed: usize, total: usize, expected: u8) {
    assert_eq!(progress_percent(analyzed, total), expected);
}

#[test]
fn stopping_discards_pending_snapshot() {
    let mut s = session();
    s.snapshot_pending = Some(ResourceSnapshot::from([("a".into(), "1".into())]));
    s.finish(ScanStatus::Stopped, 200);
    assert!(s.snapshot_pending.is_none());
    assert_eq!(s.finished_at_ms, Some(200));
}

#[test]
fn completing_keeps_pending_snapshot() {
    let mut s = session();
    s.snapshot_pending = Some(ResourceSnapshot::new());
    s.finish(ScanStatus::Completed, 200);
    assert!(s.snapshot_pending.is_some());
}

#[test]
fn kind_filters_are_case_insensitive() {
    let mut s = session();
    assert!(s.accepts_kind("Pod"));
    s.filters = vec!["deployment".into()];
    assert!(s.accepts_kind("Deployment"));
    assert!(!s.accepts_kind("Pod"));
}

#[test]
fn summary_reflects_session() {
    let s = session();
    let summary = s.summary();
    assert_eq!(summary.id, s.id);
    assert_eq!(summary.status, ScanStatus::Initializing);
    assert_eq!(summary.scan_type, ScanType::Smart);
    assert_eq!(summary.total_issues, 0);
}

#[test]
fn session_roundtrips_through_json() {
    let mut s = session();
    s.log.push(1, "hello");
    s.resource_status.insert("Pod/default/a".into(), ResourceStatus::Ignored);
    let json = serde_json::to_string(&s).unwrap();
    let back: ScanSession = serde_json::from_str(&json).unwrap();
    assert_eq!(back, s);
}

proptest! {
    #[test]
    fn log_never_exceeds_cap(cap in 1usize..20, n in 0usize..100) {
        let mut log = ScanLog::with_cap(cap);
        for i in 0..n {
            log.push(i as u64, "x");
        }
        prop_assert_eq!(log.len(), n.min(cap));
    }
}
