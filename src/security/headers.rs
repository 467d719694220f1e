//! Declarative response security headers.
//!
//! # Responsibilities
//! - Build the Content-Security-Policy from the trusted-origin set
//! - Provide the fixed frame/XSS/referrer/permissions/HSTS headers
//!
//! # Design Decisions
//! - Computed once at guard initialization and never mutated
//! - Declared here, enforced by the serving layer (see `http::middleware`)

use crate::security::origins::TrustedOriginSet;

pub const CONTENT_SECURITY_POLICY: &str = "Content-Security-Policy";

const FIXED_HEADERS: [(&str, &str); 6] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
    (
        "Permissions-Policy",
        "camera=(), microphone=(), geolocation=(), payment=()",
    ),
    (
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains; preload",
    ),
];

/// Directives whose sources are `'self'` plus every trusted auxiliary origin.
const SCOPED_DIRECTIVES: [&str; 5] = ["script-src", "style-src", "img-src", "font-src", "connect-src"];

/// The full header set, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeaders {
    headers: Vec<(String, String)>,
}

impl SecurityHeaders {
    pub fn build(origins: &TrustedOriginSet) -> Self {
        let mut headers = Vec::with_capacity(FIXED_HEADERS.len() + 1);
        headers.push((CONTENT_SECURITY_POLICY.to_string(), content_security_policy(origins)));
        headers.extend(
            FIXED_HEADERS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        Self { headers }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Build the CSP directive string.
pub fn content_security_policy(origins: &TrustedOriginSet) -> String {
    let mut sources = String::from("'self'");
    for host in origins.auxiliary_hosts() {
        sources.push_str(" https://");
        sources.push_str(host);
    }

    let mut directives = vec!["default-src 'self'".to_string()];
    directives.extend(SCOPED_DIRECTIVES.iter().map(|d| format!("{d} {sources}")));
    directives.extend(
        [
            "frame-ancestors 'none'",
            "form-action 'self'",
            "base-uri 'self'",
            "upgrade-insecure-requests",
        ]
        .map(String::from),
    );
    directives.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn origins(trusted: &[&str]) -> TrustedOriginSet {
        TrustedOriginSet::from_config(&AppConfig {
            base_url: "https://app.example.com".into(),
            cookie_domain: "app.example.com".into(),
            trusted_origins: trusted.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_csp_scopes_trusted_origins() {
        let csp = content_security_policy(&origins(&["api.example.com", "cdn.example.com"]));
        assert_eq!(
            csp,
            "default-src 'self'; \
             script-src 'self' https://api.example.com https://cdn.example.com; \
             style-src 'self' https://api.example.com https://cdn.example.com; \
             img-src 'self' https://api.example.com https://cdn.example.com; \
             font-src 'self' https://api.example.com https://cdn.example.com; \
             connect-src 'self' https://api.example.com https://cdn.example.com; \
             frame-ancestors 'none'; form-action 'self'; base-uri 'self'; upgrade-insecure-requests"
        );
    }

    #[test]
    fn test_fixed_headers_present() {
        let headers = SecurityHeaders::build(&origins(&[]));
        assert_eq!(headers.len(), 7);
        assert_eq!(headers.get("x-frame-options"), Some("DENY"));
        assert_eq!(headers.get("X-Content-Type-Options"), Some("nosniff"));
        assert_eq!(
            headers.get("Strict-Transport-Security"),
            Some("max-age=31536000; includeSubDomains; preload")
        );
        assert!(headers
            .get(CONTENT_SECURITY_POLICY)
            .unwrap()
            .contains("connect-src 'self';"));
    }
}
