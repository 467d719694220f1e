//! Outbound request and response types.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::security::CSRF_HEADER;

/// A call the application wants to make.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Absolute URL or a path relative to the backend base URL.
    pub target: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Caller identity for rate limiting; `None` means anonymous.
    pub identity: Option<String>,
}

impl OutboundRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: None,
            identity: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// The anti-forgery token carried by this request, if any.
    pub fn csrf_token(&self) -> Option<&str> {
        self.headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok())
    }
}

/// What came back from the network.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl OutboundResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
