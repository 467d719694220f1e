//! Serving-layer behaviour: header stamping and the anti-forgery middleware.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{active_harness, harness, test_config};
use tab_shield::cache::Cache;
use tab_shield::guard::Guard;
use tab_shield::http::middleware::CLIENT_ID_HEADER;
use tab_shield::http::{build_router, AppState};
use tab_shield::security::CSRF_HEADER;

fn app(guard: Arc<Guard>) -> Router {
    let cache = Arc::new(Cache::new(&test_config().cache));
    build_router(AppState { guard, cache })
}

fn sanitize_request(token: Option<&str>, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/sanitize")
        .header(header::CONTENT_TYPE, "application/json")
        .header(CLIENT_ID_HEADER, "tab-1");
    if let Some(token) = token {
        builder = builder.header(CSRF_HEADER, token);
    }
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    let body = json!({
        "fields": { "name": " <b>Ann</b> ", "age": 3 },
        "schema": { "name": "text" }
    });
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let h = active_harness(&test_config());
    let response = app(h.guard.clone())
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    let csp = headers["content-security-policy"].to_str().unwrap();
    assert!(csp.contains("https://api.example.com"));

    // Rejections carry them too.
    let response = app(h.guard.clone())
        .oneshot(sanitize_request(None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_token_endpoint_sets_cookie() {
    let h = active_harness(&test_config());
    let token = h.guard.token_store().get_token().unwrap();

    let response = app(h.guard.clone())
        .oneshot(Request::get("/csrf-token").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with(&format!("XSRF-TOKEN={token}")));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));

    assert_eq!(json_body(response).await["token"], token);
}

#[tokio::test]
async fn test_state_changing_request_requires_token() {
    let h = active_harness(&test_config());
    let token = h.guard.token_store().get_token().unwrap();

    let response = app(h.guard.clone())
        .oneshot(sanitize_request(None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(h.guard.clone())
        .oneshot(sanitize_request(Some("0000"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(h.guard.clone())
        .oneshot(sanitize_request(Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["name"], "bAnn/b");
    assert_eq!(body["age"], 3);
}

#[tokio::test]
async fn test_untrusted_origin_is_forbidden() {
    let h = active_harness(&test_config());
    let token = h.guard.token_store().get_token().unwrap();

    let response = app(h.guard.clone())
        .oneshot(sanitize_request(Some(&token), Some("https://evil.example.net")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(h.guard.clone())
        .oneshot(sanitize_request(Some(&token), Some("https://api.example.com")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limited_client_gets_429() {
    let h = active_harness(&test_config());
    let token = h.guard.token_store().get_token().unwrap();

    for _ in 0..5 {
        let response = app(h.guard.clone())
            .oneshot(sanitize_request(Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app(h.guard.clone())
        .oneshot(sanitize_request(Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_uninitialized_guard_serves_without_headers() {
    let h = harness(&test_config());
    let response = app(h.guard.clone())
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("content-security-policy"));
}
