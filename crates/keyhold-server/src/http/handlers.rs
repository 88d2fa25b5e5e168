// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use keyhold_core::time::unix_millis_now;
use keyhold_core::WriteRequest;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::http::client_identity::resolve_client_id;
use crate::http::response_contract::{
    api_error_response, api_error_response_with_status, success_response, write_error_response,
    ApiErrorCode,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct KvParams {
    project: Option<String>,
    key: Option<String>,
}

impl KvParams {
    /// Malformed query strings are treated like empty ones.
    fn from_extracted(params: Result<Query<KvParams>, QueryRejection>) -> Self {
        match params {
            Ok(Query(p)) => p,
            Err(e) => {
                debug!("ignoring unparsable query string: {e}");
                Self::default()
            }
        }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| format!("blocking task failed: {e}"))
}

fn internal_error(context: &str, detail: &str) -> Response {
    error!("{context}: {detail}");
    api_error_response(ApiErrorCode::InternalServerError)
}

pub(crate) async fn root_handler(State(state): State<AppState>) -> Response {
    let served = state.request_count.load(Ordering::Relaxed);
    Json(json!({"online": true, "reqCount": served})).into_response()
}

pub(crate) async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub(crate) async fn get_handler(
    State(state): State<AppState>,
    params: Result<Query<KvParams>, QueryRejection>,
) -> Response {
    let params = KvParams::from_extracted(params);
    let Some(key) = params.key else {
        return api_error_response(ApiErrorCode::MissingKey);
    };
    let project = params.project.unwrap_or_default();

    let store = Arc::clone(&state.store);
    match run_blocking(move || store.get(&project, &key)).await {
        Ok(Ok(Some(value))) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            value,
        )
            .into_response(),
        Ok(Ok(None)) => api_error_response(ApiErrorCode::KeyFileNonExistent),
        Ok(Err(e)) => internal_error("kv read failed", &e.to_string()),
        Err(e) => internal_error("kv read failed", &e),
    }
}

pub(crate) async fn set_handler(
    State(state): State<AppState>,
    params: Result<Query<KvParams>, QueryRejection>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let now_ms = unix_millis_now();
    let peer = peer.map(|ConnectInfo(addr)| addr);
    let Some(client_id) = resolve_client_id(&headers, &state.config.client_ip_header, peer) else {
        error!("unable to determine client identity");
        return api_error_response_with_status(
            StatusCode::FORBIDDEN,
            ApiErrorCode::InternalServerError,
        );
    };
    let params = KvParams::from_extracted(params);
    let project = params.project.unwrap_or_default();
    let key = params.key;

    let gate = Arc::clone(&state.gate);
    let outcome = run_blocking(move || {
        let req = WriteRequest {
            client_id: &client_id,
            project: &project,
            key: key.as_deref(),
            body: &body,
        };
        gate.handle_write(&req, now_ms)
    })
    .await;

    match outcome {
        Ok(Ok(())) => success_response(),
        Ok(Err(e)) => write_error_response(&e, now_ms),
        Err(e) => internal_error("kv write failed", &e),
    }
}

pub(crate) async fn delete_handler(
    State(state): State<AppState>,
    params: Result<Query<KvParams>, QueryRejection>,
) -> Response {
    let params = KvParams::from_extracted(params);
    let Some(key) = params.key else {
        return api_error_response(ApiErrorCode::MissingKey);
    };
    let project = params.project.unwrap_or_default();

    let store = Arc::clone(&state.store);
    match run_blocking(move || store.delete(&project, &key)).await {
        Ok(Ok(())) => success_response(),
        Ok(Err(e)) => internal_error("kv delete failed", &e.to_string()),
        Err(e) => internal_error("kv delete failed", &e),
    }
}
