// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

#[tokio::test]
async fn returns_trimmed_stdout() {
    let out = run(sh("echo '  hello  '"), None, Duration::from_secs(5)).await.unwrap();
    assert_eq!(out, "hello");
}

#[tokio::test]
async fn feeds_stdin() {
    let out = run(sh("cat"), Some(b"{\"kind\":\"Pod\"}".to_vec()), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(out, "{\"kind\":\"Pod\"}");
}

#[tokio::test]
async fn nonzero_exit_carries_stderr() {
    let err = run(sh("echo nope >&2; exit 3"), None, Duration::from_secs(5)).await.unwrap_err();
    match err {
        SubprocessError::Failed { program, stderr, .. } => {
            assert_eq!(program, "sh");
            assert_eq!(stderr, "nope");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn timeout_is_reported() {
    let err = run(sh("sleep 5"), None, Duration::from_millis(50)).await.unwrap_err();
    assert!(matches!(err, SubprocessError::Timeout { .. }), "got {err}");
}

#[tokio::test]
async fn missing_binary_is_spawn_error() {
    let cmd = Command::new("/nonexistent/kx-test-binary");
    let err = run(cmd, None, Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, SubprocessError::Spawn { .. }));
}
