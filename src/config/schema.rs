//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the shield.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the defense layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShieldConfig {
    /// Backend origin and trusted auxiliary origins.
    pub app: AppConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Cache sizing and freshness.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Demo serving layer.
    pub server: ServerConfig,
}

/// Application origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the single backend origin (e.g., "https://app.example.com").
    /// Relative request targets are resolved against it.
    pub base_url: String,

    /// Domain attribute of the mirrored token cookie.
    pub cookie_domain: String,

    /// Additional hostnames the application may talk to.
    pub trusted_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost".to_string(),
            cookie_domain: "localhost".to_string(),
            trusted_origins: Vec::new(),
        }
    }
}

/// Anti-forgery token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Token lifetime in seconds; also the cookie Max-Age.
    pub max_age_secs: u64,
}

impl CsrfConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self { max_age_secs: 7200 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per identity within one window.
    pub limit: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_secs: 60,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time an entry is considered fresh, in seconds.
    pub ttl_secs: u64,

    /// Grace period after the TTL during which stale values are still served.
    pub stale_secs: u64,

    /// Maximum number of entries held at once.
    pub max_size: usize,

    /// Interval of the background sweep of dead entries, in seconds.
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn stale_window(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 5 * 60,
            stale_secs: 25 * 60,
            max_size: 100,
            sweep_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Serving-layer configuration used by the `serve` subcommand.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ShieldConfig = toml::from_str(
            r#"
            [app]
            base_url = "https://app.example.com"
            trusted_origins = ["api.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.app.cookie_domain, "localhost");
        assert_eq!(config.app.trusted_origins, vec!["api.example.com"]);
        assert_eq!(config.csrf.max_age_secs, 7200);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.stale_window(), Duration::from_secs(1500));
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
    }
}
