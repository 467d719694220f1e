//! Anti-forgery middleware.
//! Rejects state-changing requests that fail guard validation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::Rejection;
use crate::guard::Guard;
use crate::net::OutboundRequest;

/// Header a client may use to name itself for rate limiting.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

fn status_for(rejection: &Rejection) -> StatusCode {
    match rejection {
        Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Rejection::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        Rejection::MissingToken | Rejection::InvalidToken | Rejection::UntrustedOrigin { .. } => {
            StatusCode::FORBIDDEN
        }
    }
}

/// Build the guard's view of an incoming request.
///
/// The origin checked is the `Origin` header when present, otherwise the
/// request path (which resolves to the application's own origin). The
/// identity is the `x-client-id` header, else the peer IP.
fn as_guarded_request(request: &Request<Body>) -> OutboundRequest {
    let target = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| request.uri().path().to_string());

    let identity = request
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

    OutboundRequest {
        method: request.method().clone(),
        target,
        headers: request.headers().clone(),
        body: None,
        identity,
    }
}

pub async fn csrf_middleware(
    State(guard): State<Arc<Guard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Safe methods pass through untouched.
    if !is_state_changing(request.method()) {
        return next.run(request).await;
    }

    let guarded = as_guarded_request(&request);
    match guard.check_request(&guarded) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = rejection.label(),
                "Request rejected"
            );
            (status_for(&rejection), rejection.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Rejection::MissingToken), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&Rejection::RateLimited { identity: "a".into() }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status_for(&Rejection::InvalidUrl("x".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_guarded_request_prefers_origin_and_client_id() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/sanitize")
            .header(header::ORIGIN, "https://evil.example.net")
            .header(CLIENT_ID_HEADER, "tab-7")
            .body(Body::empty())
            .unwrap();
        let guarded = as_guarded_request(&request);
        assert_eq!(guarded.target, "https://evil.example.net");
        assert_eq!(guarded.identity.as_deref(), Some("tab-7"));

        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/items/3")
            .body(Body::empty())
            .unwrap();
        let guarded = as_guarded_request(&request);
        assert_eq!(guarded.target, "/items/3");
        assert_eq!(guarded.identity, None);
        assert!(is_state_changing(&guarded.method));
        assert!(!is_state_changing(&Method::GET));
    }
}
