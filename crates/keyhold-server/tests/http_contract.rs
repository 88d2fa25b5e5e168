// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use keyhold_core::KvStore;
use keyhold_server::{build_router, AppState, ServerConfig};
use keyhold_store::{MemoryKvStore, SqliteKvStore};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUg==";

async fn spawn_app(store: Arc<dyn KvStore>, cfg: ServerConfig) -> SocketAddr {
    let app = build_router(AppState::new(store, cfg));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("serve app")
    });
    addr
}

async fn spawn_default() -> SocketAddr {
    spawn_app(Arc::new(MemoryKvStore::new()), ServerConfig::default()).await
}

async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    if method == "POST" || !body.is_empty() {
        req.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    req.push_str("\r\n");
    req.push_str(body);
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

fn error_name(body: &str) -> String {
    let json: Value = serde_json::from_str(body).expect("error json");
    json["error"].as_str().expect("error field").to_string()
}

fn set_body(val: &str) -> String {
    serde_json::json!({ "val": val }).to_string()
}

async fn set_as(addr: SocketAddr, client: &str, path: &str, val: &str) -> (u16, String, String) {
    send_raw(
        addr,
        "POST",
        path,
        &[("cf-connecting-ip", client), ("content-type", "application/json")],
        &set_body(val),
    )
    .await
}

#[tokio::test]
async fn status_endpoint_reports_online_and_counts_requests() {
    let addr = spawn_default().await;

    let (status, head, body) = send_raw(addr, "GET", "/", &[], "").await;
    assert_eq!(status, 200);
    assert!(header_value(&head, "x-request-id").is_some());
    let json: Value = serde_json::from_str(&body).expect("status json");
    assert_eq!(json["online"], Value::Bool(true));
    assert_eq!(json["reqCount"], 1);

    let _ = send_raw(addr, "GET", "/get?key=nothing", &[], "").await;
    let (status, _, _) = send_raw(addr, "GET", "/no-such-route", &[], "").await;
    assert_eq!(status, 404);
    let (_, _, body) = send_raw(addr, "GET", "/", &[], "").await;
    let json: Value = serde_json::from_str(&body).expect("status json");
    assert_eq!(json["reqCount"], 4);
}

#[tokio::test]
async fn stored_text_round_trips_through_get() {
    let addr = spawn_default().await;

    let (status, _, body) = set_as(addr, "198.51.100.1", "/set?project=demo&key=greeting", "hello").await;
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).expect("success json");
    assert_eq!(json["success"], Value::Bool(true));

    let (status, head, body) = send_raw(addr, "GET", "/get?project=demo&key=greeting", &[], "").await;
    assert_eq!(status, 200);
    assert_eq!(body, "hello");
    assert!(header_value(&head, "content-type")
        .is_some_and(|v| v.starts_with("text/plain")));

    // same key under another project is a separate entry
    let (status, _, body) = send_raw(addr, "GET", "/get?key=greeting", &[], "").await;
    assert_eq!(status, 400);
    assert_eq!(error_name(&body), "KeyFileNonExistent");
}

#[tokio::test]
async fn last_write_wins() {
    let addr = spawn_default().await;
    for val in ["one", "two"] {
        let (status, _, _) = set_as(addr, "198.51.100.1", "/set?key=k", val).await;
        assert_eq!(status, 200);
    }
    let (_, _, body) = send_raw(addr, "GET", "/get?key=k", &[], "").await;
    assert_eq!(body, "two");
}

#[tokio::test]
async fn disguised_file_is_rejected_and_client_is_penalized() {
    let addr = spawn_default().await;

    let (status, _, body) = set_as(addr, "203.0.113.7", "/set?key=img", PNG_B64).await;
    assert_eq!(status, 403);
    assert_eq!(error_name(&body), "ContentRejected");

    let (status, head, body) = set_as(addr, "203.0.113.7", "/set?key=note", "plain text").await;
    assert_eq!(status, 403);
    assert_eq!(error_name(&body), "RateLimited");
    let retry: u64 = header_value(&head, "retry-after")
        .and_then(|v| v.parse().ok())
        .expect("retry-after");
    assert!((1..=10).contains(&retry));

    // nothing was written for the penalized client
    let (status, _, _) = send_raw(addr, "GET", "/get?key=img", &[], "").await;
    assert_eq!(status, 400);
    let (status, _, _) = send_raw(addr, "GET", "/get?key=note", &[], "").await;
    assert_eq!(status, 400);

    // other clients are unaffected
    let (status, _, _) = set_as(addr, "203.0.113.8", "/set?key=note", "plain text").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn data_uri_wrapped_file_is_rejected() {
    let addr = spawn_default().await;
    let wrapped = format!("data:image/png;base64,{PNG_B64}");
    let (status, _, body) = set_as(addr, "203.0.113.9", "/set?key=img", &wrapped).await;
    assert_eq!(status, 403);
    assert_eq!(error_name(&body), "ContentRejected");
}

#[tokio::test]
async fn penalty_lapses_after_configured_window() {
    let cfg = ServerConfig {
        penalty: Duration::from_millis(200),
        ..ServerConfig::default()
    };
    let addr = spawn_app(Arc::new(MemoryKvStore::new()), cfg).await;

    let (status, _, _) = set_as(addr, "203.0.113.7", "/set?key=img", PNG_B64).await;
    assert_eq!(status, 403);
    let (status, _, body) = set_as(addr, "203.0.113.7", "/set?key=k", "text").await;
    assert_eq!(status, 403);
    assert_eq!(error_name(&body), "RateLimited");

    tokio::time::sleep(Duration::from_millis(350)).await;
    let (status, _, _) = set_as(addr, "203.0.113.7", "/set?key=k", "text").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn missing_key_and_malformed_body_are_client_errors() {
    let addr = spawn_default().await;

    let (status, _, body) = set_as(addr, "198.51.100.1", "/set?project=p", "v").await;
    assert_eq!(status, 400);
    assert_eq!(error_name(&body), "MissingKey");

    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/set?key=k",
        &[("cf-connecting-ip", "198.51.100.1")],
        "{not json",
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(error_name(&body), "MalformedBody");

    let (status, _, body) = send_raw(
        addr,
        "POST",
        "/set?key=k",
        &[("cf-connecting-ip", "198.51.100.1")],
        r#"{"value":"wrong field"}"#,
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(error_name(&body), "MalformedBody");

    let (status, _, body) = send_raw(addr, "GET", "/get?project=p", &[], "").await;
    assert_eq!(status, 400);
    assert_eq!(error_name(&body), "MissingKey");

    let (status, _, body) = send_raw(addr, "DELETE", "/delete", &[], "").await;
    assert_eq!(status, 400);
    assert_eq!(error_name(&body), "MissingKey");
}

#[tokio::test]
async fn empty_key_is_a_valid_key() {
    let addr = spawn_default().await;
    let (status, _, _) = set_as(addr, "198.51.100.1", "/set?key=", "blank").await;
    assert_eq!(status, 200);
    let (status, _, body) = send_raw(addr, "GET", "/get?key=", &[], "").await;
    assert_eq!(status, 200);
    assert_eq!(body, "blank");
}

#[tokio::test]
async fn delete_is_idempotent() {
    let addr = spawn_default().await;
    let (status, _, _) = set_as(addr, "198.51.100.1", "/set?project=p&key=k", "v").await;
    assert_eq!(status, 200);

    for _ in 0..2 {
        let (status, _, body) = send_raw(addr, "DELETE", "/delete?project=p&key=k", &[], "").await;
        assert_eq!(status, 200);
        let json: Value = serde_json::from_str(&body).expect("success json");
        assert_eq!(json["success"], Value::Bool(true));
    }
    let (status, _, body) = send_raw(addr, "GET", "/get?project=p&key=k", &[], "").await;
    assert_eq!(status, 400);
    assert_eq!(error_name(&body), "KeyFileNonExistent");
}

#[tokio::test]
async fn storage_faults_surface_as_internal_errors() {
    let store = Arc::new(MemoryKvStore::new());
    let addr = spawn_app(store.clone(), ServerConfig::default()).await;

    store.set_fail_writes(true);
    let (status, _, body) = set_as(addr, "198.51.100.1", "/set?key=k", "v").await;
    assert_eq!(status, 500);
    assert_eq!(error_name(&body), "InternalServerError");
    assert!(!body.contains("read-only"));

    // a storage fault does not penalize the client
    store.set_fail_writes(false);
    let (status, _, _) = set_as(addr, "198.51.100.1", "/set?key=k", "v").await;
    assert_eq!(status, 200);

    store.set_fail_reads(true);
    let (status, _, body) = send_raw(addr, "GET", "/get?key=k", &[], "").await;
    assert_eq!(status, 500);
    assert_eq!(error_name(&body), "InternalServerError");
}

#[tokio::test]
async fn peer_address_is_used_without_proxy_header() {
    let store = Arc::new(MemoryKvStore::new());
    let addr = spawn_app(store.clone(), ServerConfig::default()).await;

    let (status, _, _) = send_raw(addr, "POST", "/set?project=p&key=k", &[], &set_body("v")).await;
    assert_eq!(status, 200);
    let record = store
        .get_record("p", "k")
        .expect("read record")
        .expect("record present");
    assert_eq!(record.last_set_by, "127.0.0.1");
}

#[tokio::test]
async fn preflight_is_answered_without_being_counted() {
    let addr = spawn_default().await;

    let (status, head, _) = send_raw(
        addr,
        "OPTIONS",
        "/set",
        &[
            ("origin", "https://app.example"),
            ("access-control-request-method", "POST"),
            ("access-control-request-headers", "content-type"),
        ],
        "",
    )
    .await;
    assert_eq!(status, 204);
    assert_eq!(
        header_value(&head, "access-control-allow-origin"),
        Some("https://app.example")
    );
    assert_eq!(
        header_value(&head, "access-control-allow-credentials"),
        Some("true")
    );
    assert!(header_value(&head, "access-control-allow-methods")
        .is_some_and(|v| v.contains("DELETE")));
    assert_eq!(header_value(&head, "access-control-max-age"), Some("300"));

    let (_, head, body) = send_raw(addr, "GET", "/", &[("origin", "https://app.example")], "").await;
    assert_eq!(
        header_value(&head, "access-control-allow-origin"),
        Some("https://app.example")
    );
    let json: Value = serde_json::from_str(&body).expect("status json");
    assert_eq!(json["reqCount"], 1);
}

#[tokio::test]
async fn disallowed_origin_gets_no_cors_headers() {
    let cfg = ServerConfig {
        cors_allowed_origins: vec!["https://app.example".to_string()],
        ..ServerConfig::default()
    };
    let addr = spawn_app(Arc::new(MemoryKvStore::new()), cfg).await;
    let (status, head, _) = send_raw(addr, "GET", "/", &[("origin", "https://evil.example")], "").await;
    assert_eq!(status, 200);
    assert!(header_value(&head, "access-control-allow-origin").is_none());
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    let cfg = ServerConfig {
        max_body_bytes: 64,
        ..ServerConfig::default()
    };
    let addr = spawn_app(Arc::new(MemoryKvStore::new()), cfg).await;
    let big = "x".repeat(256);
    let (status, _, _) = set_as(addr, "198.51.100.1", "/set?key=k", &big).await;
    assert_eq!(status, 413);
}

#[tokio::test]
async fn values_survive_a_restart_on_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("db.sqlite3");

    let store = SqliteKvStore::open(&db).expect("open db");
    let addr = spawn_app(Arc::new(store), ServerConfig::default()).await;
    let (status, _, _) = set_as(addr, "198.51.100.1", "/set?project=p&key=k", "kept").await;
    assert_eq!(status, 200);

    let reopened = SqliteKvStore::open(&db).expect("reopen db");
    let addr = spawn_app(Arc::new(reopened), ServerConfig::default()).await;
    let (status, _, body) = send_raw(addr, "GET", "/get?project=p&key=k", &[], "").await;
    assert_eq!(status, 200);
    assert_eq!(body, "kept");
}
