// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use kx_adapters::{AnalysisAdapter, ClusterConnector, ShadowAdapter};
use kx_core::{ScanId, ScanType};

use super::ListenCtx;
use crate::protocol::Response;

pub(super) fn handle_start<S, A, C>(
    ctx: &ListenCtx<S, A, C>,
    cluster_id: &str,
    scan_type: ScanType,
    filters: Vec<String>,
) -> Response
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
{
    match ctx.scans.start(cluster_id, scan_type, filters) {
        Ok(id) => Response::ScanStarted { id },
        Err(e) => Response::error(e),
    }
}

/// Stopping a finished scan is a no-op and still answers `Ok`.
pub(super) async fn handle_stop<S, A, C>(ctx: &ListenCtx<S, A, C>, id: &ScanId) -> Response
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
{
    match ctx.scans.stop(id).await {
        Ok(()) => Response::Ok,
        Err(e) => Response::error(e),
    }
}
