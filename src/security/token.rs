//! Anti-forgery token lifecycle.
//!
//! # Responsibilities
//! - Mint a 32-byte random token, hex-encoded, on first use
//! - Validate candidates in constant time
//! - Rotate on demand or when the token outlives its max age
//! - Mirror the live token into a host-only strict cookie
//!
//! # Design Decisions
//! - Exactly one live token, swapped atomically (never mutated in place)
//! - The in-memory copy is authoritative; the cookie is only transport
//! - Length mismatch is rejected before any byte is compared

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwapOption;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::clock::{Clock, SystemClock};
use crate::config::ShieldConfig;
use crate::error::GuardError;
use crate::lifecycle::Singleton;

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const CSRF_COOKIE: &str = "XSRF-TOKEN";
pub const TOKEN_BYTES: usize = 32;

/// Source of token bytes.
pub trait EntropySource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), GuardError>;
}

/// The operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), GuardError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| GuardError::RandomSource(e.to_string()))
    }
}

/// The live anti-forgery token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub issued_at: SystemTime,
    pub max_age: Duration,
}

impl Token {
    fn is_expired(&self, now: SystemTime) -> bool {
        now.duration_since(self.issued_at)
            .map(|age| age >= self.max_age)
            .unwrap_or(false)
    }
}

/// Attribute bag of the mirrored cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfCookie {
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub max_age: Duration,
    pub domain: String,
}

impl fmt::Display for CsrfCookie {
    /// Renders a `Set-Cookie` header value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", CSRF_COOKIE, self.value)?;
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        write!(
            f,
            "; SameSite=Strict; Max-Age={}; Domain={}",
            self.max_age.as_secs(),
            self.domain
        )
    }
}

static GLOBAL: Singleton<TokenStore> = Singleton::new();

/// Owner of the process's anti-forgery token.
pub struct TokenStore {
    current: ArcSwapOption<Token>,
    mint_lock: Mutex<()>,
    max_age: Duration,
    cookie_domain: String,
    entropy: Arc<dyn EntropySource>,
    clock: Arc<dyn Clock>,
    comparisons: AtomicU64,
}

impl TokenStore {
    pub fn new(max_age: Duration, cookie_domain: impl Into<String>) -> Self {
        Self::with_sources(max_age, cookie_domain, Arc::new(OsEntropy), Arc::new(SystemClock))
    }

    pub fn with_sources(
        max_age: Duration,
        cookie_domain: impl Into<String>,
        entropy: Arc<dyn EntropySource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            mint_lock: Mutex::new(()),
            max_age,
            cookie_domain: cookie_domain.into(),
            entropy,
            clock,
            comparisons: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ShieldConfig) -> Self {
        Self::new(config.csrf.max_age(), config.app.cookie_domain.clone())
    }

    /// The process-wide store.
    pub fn global(config: &ShieldConfig) -> Arc<TokenStore> {
        GLOBAL.get_or_init(|| Self::from_config(config))
    }

    pub fn reset_global_for_testing() {
        GLOBAL.reset();
    }

    /// Return the live token, minting a new one if none exists or it expired.
    pub fn get_token(&self) -> Result<String, GuardError> {
        let now = self.clock.wall();
        if let Some(token) = self.current.load_full() {
            if !token.is_expired(now) {
                return Ok(token.value.clone());
            }
        }

        let _guard = self.mint_lock.lock().expect("token mint mutex poisoned");
        // Another caller may have minted while we waited.
        if let Some(token) = self.current.load_full() {
            if !token.is_expired(now) {
                return Ok(token.value.clone());
            }
        }

        let mut bytes = [0u8; TOKEN_BYTES];
        self.entropy.fill(&mut bytes)?;
        let token = Token {
            value: hex::encode(bytes),
            issued_at: now,
            max_age: self.max_age,
        };
        let value = token.value.clone();
        self.current.store(Some(Arc::new(token)));

        tracing::debug!(domain = %self.cookie_domain, "Issued new anti-forgery token");
        Ok(value)
    }

    /// Check a candidate against the live token.
    pub fn validate(&self, candidate: &str) -> bool {
        let Some(token) = self.current.load_full() else {
            return false;
        };
        if token.is_expired(self.clock.wall()) {
            return false;
        }
        if candidate.len() != token.value.len() {
            return false;
        }
        self.comparisons.fetch_add(1, Ordering::Relaxed);
        constant_time_eq(candidate.as_bytes(), token.value.as_bytes())
    }

    /// Discard the live token; the next `get_token` mints a fresh one.
    pub fn refresh_token(&self) {
        self.current.store(None);
        tracing::info!("Anti-forgery token discarded");
    }

    /// Headers to attach to an outbound call.
    pub fn headers(&self) -> Result<HashMap<String, String>, GuardError> {
        let mut headers = HashMap::with_capacity(1);
        headers.insert(CSRF_HEADER.to_string(), self.get_token()?);
        Ok(headers)
    }

    /// The cookie mirroring the live token, if one has been issued.
    pub fn cookie(&self) -> Option<CsrfCookie> {
        self.current.load_full().map(|token| CsrfCookie {
            value: token.value.clone(),
            http_only: true,
            secure: true,
            max_age: token.max_age,
            domain: self.cookie_domain.clone(),
        })
    }

    /// Snapshot of the live token.
    pub fn current(&self) -> Option<Token> {
        self.current.load_full().map(|t| (*t).clone())
    }

    /// Number of full byte-wise comparisons performed so far.
    pub fn comparisons(&self) -> u64 {
        self.comparisons.load(Ordering::Relaxed)
    }
}

/// Compare two equal-length byte strings without early exit.
///
/// Returns false for unequal lengths without inspecting contents.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}
