//! The single underlying call site for outbound requests.

use async_trait::async_trait;
use url::Url;

use crate::error::DispatchError;
use crate::net::request::{OutboundRequest, OutboundResponse};

/// Performs the actual network call. The guard owns the only caller.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// `url` is the resolved, allowlisted target; `request.headers` already
    /// carries the anti-forgery header.
    async fn send(&self, url: Url, request: OutboundRequest) -> Result<OutboundResponse, DispatchError>;
}

/// `reqwest`-backed dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ReqwestDispatcher {
    client: reqwest::Client,
}

impl ReqwestDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Dispatch for ReqwestDispatcher {
    async fn send(&self, url: Url, request: OutboundRequest) -> Result<OutboundResponse, DispatchError> {
        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?
            .to_vec();

        Ok(OutboundResponse {
            status,
            headers,
            body,
        })
    }
}
