//! Client-side defense-in-depth layer.

pub mod cache;
pub mod clock;
pub mod config;
pub mod dom;
pub mod error;
pub mod guard;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use cache::Cache;
pub use config::ShieldConfig;
pub use error::{DispatchError, GuardError, Rejection};
pub use guard::Guard;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{RateLimiter, SanitizationContext, TokenStore};
