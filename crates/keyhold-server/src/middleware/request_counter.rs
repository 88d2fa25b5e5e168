// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;

/// Counts every request that makes it past CORS, including the status request itself.
pub(crate) async fn request_counter_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    next.run(req).await
}
