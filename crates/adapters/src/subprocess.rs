// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded execution of external CLI tools

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to exec {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} {subcommand} timed out after {}s", timeout.as_secs())]
    Timeout { program: String, subcommand: String, timeout: Duration },
    #[error("{program} {subcommand} failed: {stderr}")]
    Failed { program: String, subcommand: String, stderr: String },
}

/// Run `cmd` to completion, optionally feeding `stdin`, within `timeout`.
///
/// Returns trimmed stdout on success. The child is killed if the timeout
/// elapses.
pub async fn run(
    mut cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<String, SubprocessError> {
    let std_cmd = cmd.as_std();
    let program = std_cmd.get_program().to_string_lossy().into_owned();
    let subcommand =
        std_cmd.get_args().next().map(|a| a.to_string_lossy().into_owned()).unwrap_or_default();

    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child =
        cmd.spawn().map_err(|source| SubprocessError::Spawn { program: program.clone(), source })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        // A closed pipe surfaces as a non-zero exit below
        if let Err(e) = pipe.write_all(&input).await {
            tracing::debug!(%program, error = %e, "failed writing child stdin");
        }
        drop(pipe);
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(SubprocessError::Spawn { program, source }),
        Err(_) => return Err(SubprocessError::Timeout { program, subcommand, timeout }),
    };

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stderr = if stderr.is_empty() {
            format!("{} | stdout: {}", output.status, String::from_utf8_lossy(&output.stdout).trim())
        } else {
            stderr
        };
        Err(SubprocessError::Failed { program, subcommand, stderr })
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
