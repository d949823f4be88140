// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use kx_adapters::{AnalysisAdapter, ClusterConnector, ShadowAdapter};

use super::ListenCtx;
use crate::protocol::Response;

pub(super) fn handle_start<S, A, C>(
    ctx: &ListenCtx<S, A, C>,
    cluster_id: &str,
    resource_id: &str,
    issue: &str,
) -> Response
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
{
    if issue.trim().is_empty() {
        return Response::error("issue description must not be empty");
    }
    match ctx.orchestrator.start(cluster_id, resource_id, issue) {
        Ok(id) => Response::WorkflowStarted { id },
        Err(e) => Response::error(e),
    }
}
