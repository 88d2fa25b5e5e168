// SPDX-License-Identifier: Apache-2.0

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;

const MAX_ORIGIN_LEN: usize = 256;
const ALLOWED_METHODS: &str = "GET,POST,DELETE,OPTIONS";
const PREFLIGHT_MAX_AGE_SECS: &str = "300";

fn request_origin(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("origin")?.to_str().ok()?.trim();
    if raw.is_empty() || raw.len() > MAX_ORIGIN_LEN {
        return None;
    }
    Some(raw.to_string())
}

fn apply_origin_headers(headers: &mut HeaderMap, origin: &str) {
    if let Ok(v) = HeaderValue::from_str(origin) {
        headers.insert("access-control-allow-origin", v);
    }
    headers.insert(
        "access-control-allow-credentials",
        HeaderValue::from_static("true"),
    );
    headers.append("vary", HeaderValue::from_static("Origin"));
}

/// Answers preflights directly so they never reach the counter or handlers.
/// Credentials are allowed, so the request origin is echoed instead of `*`.
pub(crate) async fn cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = request_origin(req.headers()).filter(|o| state.config.origin_allowed(o));

    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        if let Some(origin) = origin {
            let requested_headers = req
                .headers()
                .get("access-control-request-headers")
                .cloned();
            let headers = resp.headers_mut();
            apply_origin_headers(headers, &origin);
            headers.insert(
                "access-control-allow-methods",
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            if let Some(v) = requested_headers {
                headers.insert("access-control-allow-headers", v);
            }
            headers.insert(
                "access-control-max-age",
                HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
            );
        }
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(origin) = origin {
        apply_origin_headers(resp.headers_mut(), &origin);
    }
    resp
}
