//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, capacity > 0)
//! - Check that origins are bare hostnames and the base URL parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ShieldConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::ShieldConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("app.base_url `{0}` is not a valid absolute URL")]
    InvalidBaseUrl(String),

    #[error("app.base_url `{0}` has no host")]
    MissingHost(String),

    #[error("trusted origin `{0}` must be a bare hostname")]
    InvalidTrustedOrigin(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ShieldConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.app.base_url) {
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::MissingHost(config.app.base_url.clone()));
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::InvalidBaseUrl(config.app.base_url.clone())),
    }

    for origin in &config.app.trusted_origins {
        if !is_bare_hostname(origin) {
            errors.push(ValidationError::InvalidTrustedOrigin(origin.clone()));
        }
    }

    let zero_checks: [(&'static str, bool); 6] = [
        ("csrf.max_age_secs", config.csrf.max_age_secs == 0),
        ("rate_limit.limit", config.rate_limit.limit == 0),
        ("rate_limit.window_secs", config.rate_limit.window_secs == 0),
        ("cache.ttl_secs", config.cache.ttl_secs == 0),
        ("cache.max_size", config.cache.max_size == 0),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs == 0),
    ];
    for (field, is_zero) in zero_checks {
        if is_zero {
            errors.push(ValidationError::Zero { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_bare_hostname(origin: &str) -> bool {
    !origin.is_empty()
        && origin
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !origin.starts_with('.')
        && !origin.ends_with('.')
}
