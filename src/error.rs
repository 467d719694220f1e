//! Error types shared across the shield.

use thiserror::Error;

use crate::config::ConfigError;

/// Fatal or lifecycle errors.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The OS random source could not produce token bytes.
    #[error("secure random source unavailable: {0}")]
    RandomSource(String),

    /// An operation that requires an active guard was called too early.
    #[error("guard is not active")]
    NotActive,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a request was refused. Returned synchronously to the caller, which
/// decides how to present it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing anti-forgery token")]
    MissingToken,

    #[error("invalid anti-forgery token")]
    InvalidToken,

    #[error("rate limit exceeded for `{identity}`")]
    RateLimited { identity: String },

    #[error("untrusted origin `{host}`")]
    UntrustedOrigin { host: String },

    #[error("cannot resolve request target `{0}`")]
    InvalidUrl(String),
}

impl Rejection {
    /// Stable label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::MissingToken => "missing_token",
            Rejection::InvalidToken => "invalid_token",
            Rejection::RateLimited { .. } => "rate_limited",
            Rejection::UntrustedOrigin { .. } => "untrusted_origin",
            Rejection::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Errors from [`crate::guard::Guard::dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("transport error: {0}")]
    Transport(String),
}
