//! HTTP server for the serving layer.
//!
//! # Responsibilities
//! - Create Axum Router with the demo handlers
//! - Wire up middleware (tracing, anti-forgery, security headers)
//! - Bind server to listener with graceful shutdown
//!
//! # Routes
//! - `GET /healthz` liveness
//! - `GET /csrf-token` issue token and mirrored cookie
//! - `POST /sanitize` scrub a JSON object per a field schema
//! - `GET /cache/stats` cache counters

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::cache::Cache;
use crate::guard::Guard;
use crate::http::middleware::{apply_security_headers, csrf_middleware};
use crate::security::SanitizationContext;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<Guard>,
    pub cache: Arc<Cache<Value>>,
}

/// Body of `POST /sanitize`.
#[derive(Debug, Deserialize)]
pub struct SanitizeRequest {
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub schema: HashMap<String, SanitizationContext>,
}

/// HTTP server fronting the guard.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// `guard` should already be initialized; its header set is applied to
    /// every response.
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Run the server until `shutdown` fires or Ctrl+C is received.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => {}
                    _ = ctrl_c() => {}
                }
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let guard = state.guard.clone();
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/csrf-token", get(issue_token))
        .route("/sanitize", post(sanitize))
        .route("/cache/stats", get(cache_stats))
        .route_layer(middleware::from_fn_with_state(guard.clone(), csrf_middleware))
        .with_state(state);

    let router = match guard.security_headers() {
        Some(headers) => apply_security_headers(router, headers),
        None => {
            tracing::warn!("Guard not initialized; serving without security headers");
            router
        }
    };
    router.layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn issue_token(State(state): State<AppState>) -> Response {
    let tokens = state.guard.token_store();
    let token = match tokens.get_token() {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue anti-forgery token");
            return (StatusCode::INTERNAL_SERVER_ERROR, "token unavailable").into_response();
        }
    };

    match tokens.cookie() {
        Some(cookie) => (
            [(header::SET_COOKIE, cookie.to_string())],
            Json(json!({ "token": token })),
        )
            .into_response(),
        None => Json(json!({ "token": token })).into_response(),
    }
}

async fn sanitize(State(state): State<AppState>, Json(body): Json<SanitizeRequest>) -> Json<Map<String, Value>> {
    Json(state.guard.sanitize_fields(&body.fields, &body.schema))
}

async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.cache.stats();
    Json(json!({
        "entries": state.cache.len(),
        "hits": stats.hits,
        "stale_hits": stats.stale_hits,
        "misses": stats.misses,
        "evictions": stats.evictions,
        "expirations": stats.expirations,
    }))
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
