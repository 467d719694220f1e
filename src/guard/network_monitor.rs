//! Allowlisting and tagging of outbound calls.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};

use crate::clock::Clock;
use crate::error::{DispatchError, Rejection};
use crate::net::{Dispatch, OutboundRequest, OutboundResponse};
use crate::observability::{metrics, SecurityEvent, SecurityEventKind, SecuritySink, Severity};
use crate::security::{TokenStore, TrustedOriginSet};

const CSRF_HEADER_LOWER: &str = "x-csrf-token";

/// Wraps the single dispatch primitive.
pub struct NetworkMonitor {
    origins: Arc<TrustedOriginSet>,
    tokens: Arc<TokenStore>,
    dispatcher: Arc<dyn Dispatch>,
    sink: Arc<dyn SecuritySink>,
    clock: Arc<dyn Clock>,
}

impl NetworkMonitor {
    pub fn new(
        origins: Arc<TrustedOriginSet>,
        tokens: Arc<TokenStore>,
        dispatcher: Arc<dyn Dispatch>,
        sink: Arc<dyn SecuritySink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            origins,
            tokens,
            dispatcher,
            sink,
            clock,
        }
    }

    /// Reject untrusted targets before they reach the network; otherwise
    /// attach the anti-forgery header and forward.
    pub async fn dispatch(&self, mut request: OutboundRequest) -> Result<OutboundResponse, DispatchError> {
        let url = match self.origins.check(&request.target) {
            Ok(url) => url,
            Err(rejection) => {
                self.report_blocked(&request, &rejection);
                return Err(rejection.into());
            }
        };

        let token = self.tokens.get_token()?;
        let value = HeaderValue::from_str(&token).map_err(|e| DispatchError::Transport(e.to_string()))?;
        request
            .headers
            .insert(HeaderName::from_static(CSRF_HEADER_LOWER), value);

        tracing::debug!(method = %request.method, url = %url, "Dispatching outbound request");
        self.dispatcher.send(url, request).await
    }

    fn report_blocked(&self, request: &OutboundRequest, rejection: &Rejection) {
        metrics::record_rejection(rejection.label());
        let mut event = SecurityEvent::new(
            SecurityEventKind::UntrustedOriginBlocked,
            Severity::Warning,
            self.clock.wall(),
        )
        .with("target", request.target.clone())
        .with("method", request.method.as_str())
        .with("reason", rejection.label());
        if let Rejection::UntrustedOrigin { host } = rejection {
            event = event.with("host", host.clone());
        }
        self.sink.emit(&event);
    }
}
