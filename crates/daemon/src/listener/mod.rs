// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and handling
//! each one on its own task. Long-running work (scans, workflows) is started
//! in the engine and answered immediately with its id.

mod audit;
mod clusters;
mod resources;
mod scans;
mod workflows;

use std::path::PathBuf;
use std::sync::Arc;

use kx_adapters::{AnalysisAdapter, ClusterConnector, ShadowAdapter};
use kx_engine::{ClusterRegistry, Orchestrator, ScanEngine};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::env::{ipc_timeout, PROTOCOL_VERSION};
use crate::protocol::{self, ProtocolError, Request, Response};

/// Shared daemon context for all request handlers.
pub struct ListenCtx<S, A, C> {
    pub orchestrator: Orchestrator<S, A, C>,
    pub scans: ScanEngine<A>,
    /// Serves on-demand resource analysis
    pub analysis: A,
    pub connector: C,
    pub clusters: ClusterRegistry,
    pub audit_log_path: PathBuf,
    pub audit_public_key_path: PathBuf,
    pub shutdown: Arc<Notify>,
}

/// Listener task for accepting socket connections.
pub struct Listener<S, A, C> {
    unix: UnixListener,
    ctx: Arc<ListenCtx<S, A, C>>,
}

impl<S, A, C> Listener<S, A, C>
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
{
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx<S, A, C>>) -> Self {
        Self { unix, ctx }
    }

    /// Run the listener loop, spawning a task for each connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("Unix accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("Client disconnected"),
        ProtocolError::Timeout => warn!("Connection timeout"),
        _ => error!("Connection error: {}", e),
    }
}

/// Handle a single client connection.
///
/// The handler is raced against client disconnect detection. If the client
/// goes away first the handler future is dropped; work already handed to
/// the engine keeps running.
async fn handle_connection<S, A, C, R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx<S, A, C>,
) -> Result<(), ProtocolError>
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let request = protocol::read_request(&mut reader, ipc_timeout()).await?;

    // Status polls are frequent; keep them out of the info log
    if matches!(request, Request::ScanStatus { .. } | Request::WorkflowStatus { .. }) {
        debug!(request = ?request, "received query");
    } else {
        info!(request = ?request, "received request");
    }

    let response = tokio::select! {
        response = handle_request(request, ctx) => response,
        _ = detect_client_disconnect(&mut reader) => {
            debug!("Client disconnected, dropping handler");
            return Ok(());
        }
    };

    debug!("Sending response: {:?}", response);
    protocol::write_response(&mut writer, &response, ipc_timeout()).await
}

/// In the request-response protocol the client sends one request then
/// waits, so any read completing here means EOF.
async fn detect_client_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

/// Handle a single request and return a response.
pub(crate) async fn handle_request<S, A, C>(request: Request, ctx: &ListenCtx<S, A, C>) -> Response
where
    S: ShadowAdapter,
    A: AnalysisAdapter,
    C: ClusterConnector,
{
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                warn!(client = %version, daemon = PROTOCOL_VERSION, "protocol version mismatch");
            }
            Response::Hello { version: PROTOCOL_VERSION.to_string() }
        }

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        Request::ClusterConnect { cluster_id, kubeconfig } => {
            clusters::handle_connect(ctx, cluster_id, kubeconfig).await
        }

        Request::ResourceList { cluster_id } => resources::handle_list(ctx, &cluster_id).await,
        Request::ResourceAnalyze { cluster_id, resource_id } => {
            resources::handle_analyze(ctx, &cluster_id, &resource_id).await
        }

        Request::ScanStart { cluster_id, scan_type, filters } => {
            scans::handle_start(ctx, &cluster_id, scan_type, filters)
        }
        Request::ScanStatus { id } => {
            Response::Scan { scan: ctx.scans.status(&id).map(Box::new) }
        }
        Request::ScanList => Response::Scans { scans: ctx.scans.list() },
        Request::ScanStop { id } => scans::handle_stop(ctx, &id).await,
        Request::ScanClearCache => {
            ctx.scans.clear_cache().await;
            Response::Ok
        }

        Request::WorkflowStart { cluster_id, resource_id, issue } => {
            workflows::handle_start(ctx, &cluster_id, &resource_id, &issue)
        }
        Request::WorkflowStatus { id } => {
            Response::Workflow { workflow: ctx.orchestrator.status(&id).map(Box::new) }
        }

        Request::AuditVerify => audit::handle_verify(ctx).await,
        Request::ClusterHistory { cluster_id } => audit::handle_history(ctx, cluster_id).await,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
