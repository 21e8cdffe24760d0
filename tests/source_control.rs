//! Source-control proxy: policy admission, forwarding and header rewrites.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use serde_json::Value;

mod common;
use common::{client, spawn_gateway, spawn_upstream, test_config, Recorder};

const GIT_UA: &str = "git/2.44.0";

async fn spawn_source_host(recorder: Recorder) -> String {
    // The base URL is only known after binding, so the redirect target is
    // echoed from the Host header the gateway sent.
    async fn handler(State(recorder): State<Recorder>, request: Request<Body>) -> impl IntoResponse {
        recorder.record(&request);
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (
            StatusCode::OK,
            [(header::LOCATION, format!("http://{host}/owner/repo/next"))],
            "pack-data",
        )
    }
    spawn_upstream(Router::new().route("/{*path}", any(handler)).with_state(recorder)).await
}

#[tokio::test]
async fn forwards_admitted_requests_and_rewrites_location() {
    let recorder = Recorder::default();
    let upstream = spawn_source_host(recorder.clone()).await;

    let mut config = test_config();
    config.source_control.upstream = upstream.clone();
    let gw = spawn_gateway(config).await;

    let response = client()
        .get(gw.url("/owner/repo.git/info/refs?service=git-upload-pack"))
        .header(header::USER_AGENT, GIT_UA)
        .header("cf-connecting-ip", "203.0.113.7")
        .header("cf-ray", "abc123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "60");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "59");
    assert_eq!(response.headers()["x-ratelimit-window"], "60s");
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        response.headers()[header::LOCATION],
        format!("{}/owner/repo/next", gw.origin()).as_str()
    );
    assert_eq!(response.text().await.unwrap(), "pack-data");

    let seen = recorder.last();
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.path, "/owner/repo.git/info/refs");
    assert_eq!(seen.query.as_deref(), Some("service=git-upload-pack"));
    assert_eq!(seen.headers[header::USER_AGENT], GIT_UA);
    assert!(seen.headers.get("cf-connecting-ip").is_none());
    assert!(seen.headers.get("cf-ray").is_none());
}

#[tokio::test]
async fn forwards_request_bodies() {
    let recorder = Recorder::default();
    let upstream = spawn_source_host(recorder.clone()).await;

    let mut config = test_config();
    config.source_control.upstream = upstream;
    let gw = spawn_gateway(config).await;

    let response = client()
        .post(gw.url("/owner/repo.git/git-upload-pack"))
        .header(header::USER_AGENT, GIT_UA)
        .body("0032want 0123456789abcdef")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorder.last().method, "POST");
}

#[tokio::test]
async fn rejects_unknown_clients() {
    let recorder = Recorder::default();
    let mut config = test_config();
    config.source_control.upstream = spawn_source_host(recorder.clone()).await;
    let gw = spawn_gateway(config).await;

    let response = client()
        .get(gw.url("/owner/repo"))
        .header(header::USER_AGENT, "EvilBot/1.0")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "client_not_allowed");
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn rejects_blocked_paths_from_allowed_clients() {
    let recorder = Recorder::default();
    let mut config = test_config();
    config.source_control.upstream = spawn_source_host(recorder.clone()).await;
    let gw = spawn_gateway(config).await;

    for path in ["/owner/settings", "/login", "/owner/repo/archive/main.ZIP"] {
        let response = client()
            .get(gw.url(path))
            .header(header::USER_AGENT, GIT_UA)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "path_blocked");
    }
    assert_eq!(recorder.count(), 0);
}

#[tokio::test]
async fn limits_each_client_independently() {
    let recorder = Recorder::default();
    let mut config = test_config();
    config.source_control.upstream = spawn_source_host(recorder.clone()).await;
    config.rate_limit.limit = 2;
    config.rate_limit.window_secs = 60;
    let gw = spawn_gateway(config).await;

    let send = |ip: &'static str| {
        client()
            .get(gw.url("/owner/repo"))
            .header(header::USER_AGENT, GIT_UA)
            .header("cf-connecting-ip", ip)
            .send()
    };

    assert_eq!(send("198.51.100.1").await.unwrap().status(), StatusCode::OK);
    assert_eq!(send("198.51.100.1").await.unwrap().status(), StatusCode::OK);

    let limited = send("198.51.100.1").await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers()[header::RETRY_AFTER], "60");
    let body: Value = limited.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");

    assert_eq!(send("198.51.100.2").await.unwrap().status(), StatusCode::OK);
    assert_eq!(recorder.count(), 3);
    assert_eq!(gw.gateway.limiter.tracked_clients(), 2);
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let mut config = test_config();
    // Nothing listens on the discard port.
    config.source_control.upstream = "http://127.0.0.1:9".into();
    let gw = spawn_gateway(config).await;

    let response = client()
        .get(gw.url("/owner/repo"))
        .header(header::USER_AGENT, GIT_UA)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "upstream_error");
}
