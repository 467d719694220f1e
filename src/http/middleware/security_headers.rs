//! Stamp the declared security headers on every response.

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::security::SecurityHeaders;

/// Wrap `router` so each response carries every header in `headers`,
/// overriding any value set by a handler.
pub fn apply_security_headers<S>(mut router: Router<S>, headers: &SecurityHeaders) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    for (name, value) in headers.iter() {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                router = router.layer(SetResponseHeaderLayer::overriding(name, value));
            }
            _ => tracing::warn!(header = name, "Skipping malformed security header"),
        }
    }
    router
}
