// SPDX-License-Identifier: Apache-2.0

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use keyhold_core::{WriteError, WriteErrorKind};
use serde_json::json;

/// Error names carried in the `{"error": ...}` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    RateLimited,
    MissingKey,
    MalformedBody,
    ContentRejected,
    KeyFileNonExistent,
    InternalServerError,
}

impl ApiErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "RateLimited",
            Self::MissingKey => "MissingKey",
            Self::MalformedBody => "MalformedBody",
            Self::ContentRejected => "ContentRejected",
            Self::KeyFileNonExistent => "KeyFileNonExistent",
            Self::InternalServerError => "InternalServerError",
        }
    }

    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::RateLimited | Self::ContentRejected => StatusCode::FORBIDDEN,
            Self::MissingKey | Self::MalformedBody | Self::KeyFileNonExistent => {
                StatusCode::BAD_REQUEST
            }
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WriteErrorKind> for ApiErrorCode {
    fn from(kind: WriteErrorKind) -> Self {
        match kind {
            WriteErrorKind::RateLimited => Self::RateLimited,
            WriteErrorKind::MissingKey => Self::MissingKey,
            WriteErrorKind::MalformedBody => Self::MalformedBody,
            WriteErrorKind::ContentRejected => Self::ContentRejected,
            WriteErrorKind::StorageError => Self::InternalServerError,
        }
    }
}

#[must_use]
pub(crate) fn api_error_response(code: ApiErrorCode) -> Response {
    api_error_response_with_status(code.status(), code)
}

#[must_use]
pub(crate) fn api_error_response_with_status(status: StatusCode, code: ApiErrorCode) -> Response {
    (status, Json(json!({"error": code.as_str()}))).into_response()
}

#[must_use]
pub(crate) fn success_response() -> Response {
    (StatusCode::OK, Json(json!({"success": true}))).into_response()
}

/// Maps a gate failure onto the wire. Storage detail never leaves the process.
#[must_use]
pub(crate) fn write_error_response(err: &WriteError, now_ms: u64) -> Response {
    let mut resp = api_error_response(ApiErrorCode::from(err.kind()));
    if let WriteError::RateLimited { until_ms } = err {
        let retry_secs = until_ms.saturating_sub(now_ms).div_ceil(1_000).max(1);
        if let Ok(v) = HeaderValue::from_str(&retry_secs.to_string()) {
            resp.headers_mut().insert("retry-after", v);
        }
    }
    resp
}
