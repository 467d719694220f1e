//! Trusted-origin allowlist.

use std::collections::BTreeSet;

use url::Url;

use crate::config::validation::ValidationError;
use crate::config::{AppConfig, ConfigError};
use crate::error::{GuardError, Rejection};

/// Immutable set of hostnames the application may contact, plus the base
/// URL relative targets resolve against.
#[derive(Debug, Clone)]
pub struct TrustedOriginSet {
    base: Url,
    hosts: BTreeSet<String>,
}

impl TrustedOriginSet {
    pub fn from_config(app: &AppConfig) -> Result<Self, GuardError> {
        let base = Url::parse(&app.base_url).map_err(|_| {
            ConfigError::Validation(vec![ValidationError::InvalidBaseUrl(app.base_url.clone())])
        })?;
        let base_host = base
            .host_str()
            .ok_or_else(|| ConfigError::Validation(vec![ValidationError::MissingHost(app.base_url.clone())]))?
            .to_ascii_lowercase();

        let mut hosts: BTreeSet<String> = app
            .trusted_origins
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        hosts.insert(base_host);

        Ok(Self { base, hosts })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Exact, case-insensitive hostname membership.
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }

    /// Hosts other than the application's own.
    pub fn auxiliary_hosts(&self) -> impl Iterator<Item = &str> {
        let own = self.base.host_str().unwrap_or_default().to_ascii_lowercase();
        self.hosts.iter().map(String::as_str).filter(move |h| *h != own)
    }

    /// Resolve `target` (absolute or relative to the base URL).
    pub fn resolve(&self, target: &str) -> Result<Url, Rejection> {
        self.base
            .join(target)
            .map_err(|_| Rejection::InvalidUrl(target.to_string()))
    }

    /// Resolve `target` and require its host to be trusted.
    pub fn check(&self, target: &str) -> Result<Url, Rejection> {
        let url = self.resolve(target)?;
        match url.host_str() {
            Some(host) if self.contains(host) => Ok(url),
            Some(host) => Err(Rejection::UntrustedOrigin {
                host: host.to_string(),
            }),
            None => Err(Rejection::InvalidUrl(target.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> TrustedOriginSet {
        TrustedOriginSet::from_config(&AppConfig {
            base_url: "https://app.example.com".into(),
            cookie_domain: "app.example.com".into(),
            trusted_origins: vec!["API.example.com".into(), "cdn.example.com".into()],
        })
        .unwrap()
    }

    #[test]
    fn test_membership_includes_base_host() {
        let set = set();
        assert!(set.contains("app.example.com"));
        assert!(set.contains("api.example.com"));
        assert!(set.contains("CDN.EXAMPLE.COM"));
        assert!(!set.contains("example.com"));
        assert!(!set.contains("api.example.com.evil.net"));
        assert_eq!(set.auxiliary_hosts().collect::<Vec<_>>(), vec!["api.example.com", "cdn.example.com"]);
    }

    #[test]
    fn test_relative_targets_resolve_to_base() {
        let url = set().check("/api/items?page=2").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/api/items?page=2");
    }

    #[test]
    fn test_untrusted_and_invalid_targets() {
        let set = set();
        assert_eq!(
            set.check("https://evil.example.net/steal").unwrap_err(),
            Rejection::UntrustedOrigin {
                host: "evil.example.net".into()
            }
        );
        assert!(matches!(set.check("data:text/html,hi"), Err(Rejection::InvalidUrl(_))));
        assert!(set.check("https://api.example.com:8443/v1").is_ok());
    }

    #[test]
    fn test_bad_base_url() {
        let err = TrustedOriginSet::from_config(&AppConfig {
            base_url: "::".into(),
            ..AppConfig::default()
        });
        assert!(matches!(err, Err(GuardError::Config(_))));
    }
}
