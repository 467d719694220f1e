//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → origins.rs (resolve target, check allowlist)
//!     → rate_limit.rs (per-identity window)
//!     → token.rs (validate / attach X-CSRF-Token)
//!
//! Untrusted input:
//!     → sanitize.rs (strip markup per context)
//!
//! Serving layer:
//!     → headers.rs (CSP + fixed hardening headers)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod headers;
pub mod origins;
pub mod rate_limit;
pub mod sanitize;
pub mod token;

pub use headers::SecurityHeaders;
pub use origins::TrustedOriginSet;
pub use rate_limit::{RateBucket, RateLimiter, ANONYMOUS};
pub use sanitize::{sanitize_object, sanitize_text, SanitizationContext};
pub use token::{CsrfCookie, EntropySource, OsEntropy, Token, TokenStore, CSRF_COOKIE, CSRF_HEADER};
