// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use kx_adapters::{AnalysisAdapter, ClusterConnector, ShadowAdapter};
use kx_engine::connect_cluster;

use super::ListenCtx;
use crate::protocol::Response;

pub(super) async fn handle_connect<S, A, C>(
    ctx: &ListenCtx<S, A, C>,
    cluster_id: String,
    kubeconfig: Option<PathBuf>,
) -> Response
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
{
    if cluster_id.is_empty() {
        return Response::error("cluster id must not be empty");
    }
    match connect_cluster(&ctx.connector, &ctx.clusters, &cluster_id, kubeconfig).await {
        Ok(handle) => Response::ClusterConnected { cluster_id: handle.id },
        Err(e) => Response::error(format!("failed to connect cluster {cluster_id}: {e}")),
    }
}
