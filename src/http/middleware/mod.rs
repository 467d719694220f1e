//! Serving-layer middleware.

pub mod csrf;
pub mod security_headers;

pub use csrf::{csrf_middleware, CLIENT_ID_HEADER};
pub use security_headers::apply_security_headers;
