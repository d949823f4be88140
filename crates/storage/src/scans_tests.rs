// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kx_core::{ScanType, DEFAULT_LOG_CAP};
use tempfile::TempDir;

fn store(dir: &TempDir) -> ScanStore {
    ScanStore::new(dir.path().join("scans.json"), dir.path().join("snapshots.json"))
}

fn session(status: ScanStatus) -> ScanSession {
    let mut s =
        ScanSession::new(ScanId::new(), "prod", ScanType::Full, vec![], DEFAULT_LOG_CAP, 10);
    s.status = status;
    s
}

#[test]
fn missing_files_load_empty() {
    let dir = TempDir::new().unwrap();
    assert_eq!(store(&dir).load().unwrap(), ScanState::default());
}

#[test]
fn sessions_and_snapshots_survive_reload() {
    let dir = TempDir::new().unwrap();
    let s = session(ScanStatus::Completed);
    let sessions = HashMap::from([(s.id.clone(), s.clone())]);
    let snapshots = HashMap::from([(
        "prod".to_string(),
        ResourceSnapshot::from([("Pod/default/a".to_string(), "12".to_string())]),
    )]);

    let store = store(&dir);
    store.save_sessions(&sessions).unwrap();
    store.save_snapshots(&snapshots).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.sessions.get(&s.id), Some(&s));
    assert_eq!(loaded.snapshots, snapshots);
    assert!(!dir.path().join("scans.tmp").exists());
}

#[test]
fn corrupt_document_is_moved_aside() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("scans.json"), b"{ not json").unwrap();

    let loaded = store(&dir).load().unwrap();
    assert!(loaded.sessions.is_empty());
    assert!(dir.path().join("scans.bak").exists());
    assert!(!dir.path().join("scans.json").exists());
}

#[test]
fn recovery_fails_only_running_sessions() {
    let running = session(ScanStatus::Analyzing);
    let done = session(ScanStatus::Completed);
    let mut state = ScanState {
        sessions: HashMap::from([
            (running.id.clone(), running.clone()),
            (done.id.clone(), done.clone()),
        ]),
        snapshots: HashMap::new(),
    };

    let recovered = recover_interrupted(&mut state, 99);
    assert_eq!(recovered, vec![running.id.clone()]);

    let r = &state.sessions[&running.id];
    assert_eq!(r.status, ScanStatus::Failed);
    assert_eq!(r.log.last().map(|l| l.message.as_str()), Some(INTERRUPTED_MESSAGE));
    assert_eq!(r.finished_at_ms, Some(99));
    assert_eq!(state.sessions[&done.id], done);
}
