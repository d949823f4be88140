// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kx_core::{ScanId, ScanSession, ScanStatus, ScanType};
use kx_storage::INTERRUPTED_MESSAGE;
use std::collections::HashMap;
use std::path::Path;
use tempfile::tempdir;

fn test_config(dir: &Path) -> Config {
    let mut config = Config::at(dir);
    config.audit_key_bits = 1024;
    config
}

#[tokio::test]
async fn fresh_state_dir_is_initialized() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let result = startup(&config).await.unwrap();

    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert!(config.socket_path.exists());
    assert!(config.shadows_path.is_dir());
    assert!(config.audit_key_path.exists());
    assert!(config.audit_public_key_path.exists());
    assert!(result.daemon.ctx.clusters.is_empty());
    assert!(result.daemon.ctx.scans.list().is_empty());
}

#[tokio::test]
async fn startup_lock_failed_does_not_remove_existing_files() {
    // Simulate a running daemon by holding the lock and creating its files.
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.socket_path, b"").unwrap();

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    match startup(&config).await {
        Err(LifecycleError::LockFailed(_)) => {}
        Err(e) => panic!("expected LockFailed, got: {e}"),
        Ok(_) => panic!("expected LockFailed, but startup succeeded"),
    }

    assert!(config.socket_path.exists(), "socket file must not be deleted on LockFailed");
    assert_eq!(std::fs::read_to_string(&config.lock_path).unwrap(), "12345");
}

#[tokio::test]
async fn interrupted_scans_are_failed_and_persisted() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let id = ScanId::new();
    let mut session = ScanSession::new(id.clone(), "prod", ScanType::Smart, vec![], 100, 1_000);
    session.status = ScanStatus::Analyzing;
    let store = ScanStore::new(&config.sessions_path, &config.snapshots_path);
    store.save_sessions(&HashMap::from([(id.clone(), session)])).unwrap();

    let result = startup(&config).await.unwrap();

    let recovered = result.daemon.ctx.scans.status(&id).unwrap();
    assert_eq!(recovered.status, ScanStatus::Failed);
    assert_eq!(recovered.log.last().map(|l| l.message.as_str()), Some(INTERRUPTED_MESSAGE));

    let on_disk = store.load().unwrap();
    assert_eq!(on_disk.sessions[&id].status, ScanStatus::Failed);
}

#[tokio::test]
async fn invalid_settings_abort_startup_and_release_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.settings_path, "ignored_namespaces = 7").unwrap();

    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::Settings(_)), "got {err}");
    assert!(!config.lock_path.exists());
    assert!(!config.socket_path.exists());
}

#[tokio::test]
async fn unreachable_configured_cluster_does_not_block_startup() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let missing = dir.path().join("missing-kubeconfig.yaml");
    std::fs::write(
        &config.settings_path,
        format!("[[clusters]]\nid = \"prod\"\nkubeconfig = \"{}\"\n", missing.display()),
    )
    .unwrap();

    let result = startup(&config).await.unwrap();
    assert!(!result.daemon.ctx.clusters.contains("prod"));
}
