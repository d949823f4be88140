// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use kx_adapters::{AnalysisAdapter, ClusterConnector, ShadowAdapter};
use kx_core::ResourceRef;
use tracing::info;

use super::ListenCtx;
use crate::protocol::Response;

pub(super) async fn handle_list<S, A, C>(ctx: &ListenCtx<S, A, C>, cluster_id: &str) -> Response
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
{
    let Some(cluster) = ctx.clusters.get(cluster_id) else {
        return Response::error(format!("cluster {cluster_id} is not connected"));
    };
    match cluster.adapter.list_resources(None).await {
        Ok(resources) => {
            Response::Resources { resources: resources.iter().map(ResourceRef::from).collect() }
        }
        Err(e) => Response::error(format!("failed to list resources in {cluster_id}: {e}")),
    }
}

/// Analyze one resource with the rest of its cluster as context.
pub(super) async fn handle_analyze<S, A, C>(
    ctx: &ListenCtx<S, A, C>,
    cluster_id: &str,
    resource_id: &str,
) -> Response
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
{
    let Some(cluster) = ctx.clusters.get(cluster_id) else {
        return Response::error(format!("cluster {cluster_id} is not connected"));
    };
    let resources = match cluster.adapter.list_resources(None).await {
        Ok(resources) => resources,
        Err(e) => return Response::error(format!("failed to list resources in {cluster_id}: {e}")),
    };
    let Some(target) = resources.iter().find(|r| r.unique_id == resource_id) else {
        return Response::error(format!("resource {resource_id} not found in {cluster_id}"));
    };

    let result = ctx.analysis.analyze_resource(target, &resources).await;
    info!(
        cluster_id,
        resource_id,
        issues = result.issues.len(),
        degraded = result.degraded,
        "resource analyzed"
    );
    Response::Analysis { result: Box::new(result) }
}
