// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kxd: the Kortex remediation daemon

use std::process::ExitCode;
use std::sync::Arc;

use kx_daemon::env::PROTOCOL_VERSION;
use kx_daemon::{startup, Config, Listener, StartupResult};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kxd: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("kxd: cannot open log in {}: {e}", config.state_dir.display());
            return ExitCode::FAILURE;
        }
    };
    info!(version = PROTOCOL_VERSION, state_dir = %config.state_dir.display(), "starting kxd");

    let StartupResult { mut daemon, listener } = match startup(&config).await {
        Ok(result) => result,
        Err(e) => {
            error!("startup failed: {e}");
            eprintln!("kxd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = daemon.shutdown_notify();
    tokio::spawn(Listener::new(listener, Arc::clone(&daemon.ctx)).run());
    println!("READY");

    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested by client"),
        _ = shutdown_signal() => {}
    }

    match daemon.shutdown().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("shutdown failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to `<state_dir>/daemon.log`; `RUST_LOG` overrides the `info` default.
fn init_logging(config: &Config) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.state_dir)?;
    let file_name = config.log_path.file_name().and_then(|n| n.to_str()).unwrap_or("daemon.log");
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&config.state_dir)
        .map_err(std::io::Error::other)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(guard)
}

async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("failed to install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
            info!("received Ctrl+C");
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received Ctrl+C"),
        _ = terminate.recv() => info!("received SIGTERM"),
    }
}
