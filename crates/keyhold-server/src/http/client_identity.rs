// SPDX-License-Identifier: Apache-2.0

use axum::http::HeaderMap;
use std::net::SocketAddr;

const MAX_CLIENT_ID_LEN: usize = 64;

/// First address in the trusted proxy header, if it looks like an address.
#[must_use]
pub(crate) fn normalized_proxy_ip(headers: &HeaderMap, header: &str) -> Option<String> {
    let raw = headers.get(header)?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    if first.is_empty() || first.len() > MAX_CLIENT_ID_LEN {
        return None;
    }
    if first
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
    {
        Some(first.to_string())
    } else {
        None
    }
}

/// Key for penalties and the `set_by` audit column: the proxy header when
/// present, otherwise the peer IP without its port.
#[must_use]
pub(crate) fn resolve_client_id(
    headers: &HeaderMap,
    header: &str,
    peer: Option<SocketAddr>,
) -> Option<String> {
    normalized_proxy_ip(headers, header).or_else(|| peer.map(|addr| addr.ip().to_string()))
}
