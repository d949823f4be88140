// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use kx_storage::{cluster_history, verify_log, AuditError, AuditKeys, VerifyReport};
use tracing::{info, warn};

use super::ListenCtx;
use crate::protocol::Response;

/// Entries returned by a history request
const HISTORY_LIMIT: usize = 50;

/// Verify the audit log against the persisted public key.
///
/// Runs on the blocking pool.
pub(super) async fn handle_verify<S, A, C>(ctx: &ListenCtx<S, A, C>) -> Response {
    let log_path = ctx.audit_log_path.clone();
    let key_path = ctx.audit_public_key_path.clone();
    let verified = tokio::task::spawn_blocking(move || -> Result<VerifyReport, AuditError> {
        let key = AuditKeys::load_verifying_key(&key_path)?;
        verify_log(&log_path, &key)
    })
    .await;

    match verified {
        Ok(Ok(report)) => {
            match report.first_tampered {
                Some(index) => warn!(index, "audit log failed verification"),
                None => info!(entries = report.entries.len(), "audit log verified"),
            }
            Response::AuditReport { report }
        }
        Ok(Err(e)) => Response::error(format!("audit verification failed: {e}")),
        Err(e) => Response::error(format!("audit verification task failed: {e}")),
    }
}

/// Recent audit entries for `cluster_id`, read on the blocking pool.
pub(super) async fn handle_history<S, A, C>(
    ctx: &ListenCtx<S, A, C>,
    cluster_id: String,
) -> Response {
    let log_path = ctx.audit_log_path.clone();
    let read =
        tokio::task::spawn_blocking(move || cluster_history(&log_path, &cluster_id, HISTORY_LIMIT))
            .await;
    match read {
        Ok(Ok(entries)) => Response::History { entries },
        Ok(Err(e)) => Response::error(format!("failed to read audit history: {e}")),
        Err(e) => Response::error(format!("audit history task failed: {e}")),
    }
}
