// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, Instrument};

use crate::http::client_identity::resolve_client_id;
use crate::AppState;

const MAX_REQUEST_ID_LEN: usize = 128;

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-request-id")?.to_str().ok()?.trim();
    if raw.is_empty()
        || raw.len() > MAX_REQUEST_ID_LEN
        || !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
    {
        return None;
    }
    Some(raw.to_string())
}

pub(crate) async fn request_tracing_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_id = resolve_client_id(request.headers(), &state.config.client_ip_header, peer)
        .unwrap_or_default();
    let request_id = inbound_request_id(request.headers()).unwrap_or_else(|| {
        let n = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
        format!("req-{n:016x}")
    });

    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %method,
        route = %route,
        client_id = %client_id,
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| {
        info!(
            status = response.status().as_u16(),
            latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
    });
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
