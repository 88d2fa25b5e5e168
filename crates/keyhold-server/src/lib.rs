// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;
use keyhold_core::{KvStore, PenaltyStore, WriteGate};
use tokio::task::JoinHandle;

mod config;
mod http;
mod middleware;
mod runtime;

pub use config::{
    validate_startup_config_contract, ServerConfig, CONFIG_SCHEMA_VERSION, ENV_BIND_HOST,
    ENV_CLIENT_IP_HEADER, ENV_CORS_ALLOWED_ORIGINS, ENV_DB_PATH, ENV_LOG_JSON,
    ENV_MAX_BODY_BYTES, ENV_PENALTY_MS, ENV_PENALTY_SWEEP_INTERVAL_MS, ENV_PORT,
};
pub use http::response_contract::ApiErrorCode;

pub const CRATE_NAME: &str = "keyhold-server";

/// Shared per-process state. Cloned into every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn KvStore>,
    pub gate: Arc<WriteGate>,
    pub penalties: Arc<PenaltyStore>,
    pub request_count: Arc<AtomicU64>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, config: ServerConfig) -> Self {
        let penalties = Arc::new(PenaltyStore::new());
        let gate = WriteGate::new(Arc::clone(&store), Arc::clone(&penalties))
            .with_penalty(config.penalty);
        Self {
            config: Arc::new(config),
            store,
            gate: Arc::new(gate),
            penalties,
            request_count: Arc::new(AtomicU64::new(0)),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Starts the penalty sweeper unless it is disabled by a zero interval.
    pub fn spawn_background_tasks(&self) -> Option<JoinHandle<()>> {
        runtime::penalty_sweeper::spawn_penalty_sweeper(
            Arc::clone(&self.penalties),
            self.config.penalty_sweep_interval,
        )
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::handlers::root_handler))
        .route("/get", get(http::handlers::get_handler))
        .route("/set", post(http::handlers::set_handler))
        .route("/delete", delete(http::handlers::delete_handler))
        .fallback(http::handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_counter::request_counter_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::cors::cors_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .with_state(state)
}
