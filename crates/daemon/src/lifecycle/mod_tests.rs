// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn paths_live_under_the_state_dir() {
    let config = Config::at("/var/lib/kortex");
    let paths = [
        &config.socket_path,
        &config.lock_path,
        &config.log_path,
        &config.settings_path,
        &config.sessions_path,
        &config.snapshots_path,
        &config.audit_log_path,
        &config.audit_key_path,
        &config.audit_public_key_path,
        &config.shadows_path,
    ];
    for path in paths {
        assert_eq!(path.parent(), Some(Path::new("/var/lib/kortex")), "{}", path.display());
    }
    assert_eq!(config.sessions_path.file_name().unwrap(), "scans.json");
    assert_eq!(config.audit_key_bits, DEFAULT_KEY_BITS);
}

#[tokio::test]
async fn shutdown_removes_socket_and_pid_file() {
    let dir = tempdir().unwrap();
    let mut config = Config::at(dir.path());
    config.audit_key_bits = 1024;

    let StartupResult { mut daemon, listener } = startup(&config).await.unwrap();
    assert!(config.socket_path.exists());
    assert!(config.lock_path.exists());

    drop(listener);
    daemon.shutdown().await.unwrap();
    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    // Durable state stays behind for the next start
    assert!(config.audit_key_path.exists());
}
