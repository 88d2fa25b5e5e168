// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use keyhold_server::{
    build_router, validate_startup_config_contract, AppState, ServerConfig,
    CONFIG_SCHEMA_VERSION,
};
use keyhold_store::SqliteKvStore;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("unix signal registration failed; falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cfg = ServerConfig::from_env()?;
    init_tracing(cfg.log_json);
    validate_startup_config_contract(&cfg)?;
    info!(
        schema_version = CONFIG_SCHEMA_VERSION,
        port = cfg.port,
        db_path = %cfg.db_path.display(),
        penalty_ms = u64::try_from(cfg.penalty.as_millis()).unwrap_or(u64::MAX),
        "starting keyhold-server"
    );

    let store = SqliteKvStore::open(&cfg.db_path).map_err(|e| {
        error!("failed to open database {}: {e}", cfg.db_path.display());
        format!("failed to open database: {e}")
    })?;

    let (host, port) = (cfg.bind_host.clone(), cfg.port);
    let state = AppState::new(Arc::new(store), cfg);
    let _sweeper = state.spawn_background_tasks();
    let app = build_router(state);

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| format!("bind {host}:{port} failed: {e}"))?;
    let local = listener
        .local_addr()
        .map_err(|e| format!("local addr unavailable: {e}"))?;
    info!("keyhold-server listening on {local}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received, draining connections");
    })
    .await
    .map_err(|e| format!("server failed: {e}"))
}
