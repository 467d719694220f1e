//! Process-wide security orchestrator.
//!
//! # Data Flow
//! ```text
//! Guard::initialize
//!     → TokenStore::get_token (fatal on failure)
//!     → SecurityHeaders::build (CSP from trusted origins)
//!     → install monitors (error, DOM, network)
//!     → Active
//!
//! Active:
//!     report_error(report)     → error_monitor.rs → force-block identity
//!     observe(&mut Document)   → dom_monitor.rs   → strip tags/handlers
//!     dispatch(request)        → network_monitor.rs → allowlist + X-CSRF-Token
//!     check_request(request)   → token ∧ rate limit ∧ origin
//! ```
//!
//! # Design Decisions
//! - Initialization is idempotent; a second call is a no-op
//! - Runtime anomalies are reported, never returned as errors
//! - Validation failures are typed rejections returned synchronously

pub mod dom_monitor;
pub mod error_monitor;
pub mod network_monitor;
pub mod state;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use serde_json::{Map, Value};

use crate::clock::{Clock, SystemClock};
use crate::config::ShieldConfig;
use crate::dom::Document;
use crate::error::{DispatchError, GuardError, Rejection};
use crate::lifecycle::Singleton;
use crate::net::{Dispatch, OutboundRequest, OutboundResponse, ReqwestDispatcher};
use crate::observability::{metrics, SecurityEvent, SecurityEventKind, SecuritySink, Severity, TracingSink};
use crate::security::{
    sanitize_object, sanitize_text, OsEntropy, RateLimiter, SanitizationContext, SecurityHeaders,
    TokenStore, TrustedOriginSet, ANONYMOUS,
};

pub use dom_monitor::DomMonitor;
pub use error_monitor::{ErrorMonitor, ErrorReport};
pub use network_monitor::NetworkMonitor;
pub use state::GuardState;

static GLOBAL: Singleton<Guard> = Singleton::new();

struct Monitors {
    errors: ErrorMonitor,
    dom: Arc<DomMonitor>,
    network: NetworkMonitor,
}

/// Builder for [`Guard`]. Components not supplied are created from the
/// configuration.
pub struct GuardBuilder {
    config: ShieldConfig,
    tokens: Option<Arc<TokenStore>>,
    limiter: Option<Arc<RateLimiter>>,
    dispatcher: Option<Arc<dyn Dispatch>>,
    sink: Option<Arc<dyn SecuritySink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl GuardBuilder {
    pub fn token_store(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatch>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn SecuritySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Guard, GuardError> {
        let origins = Arc::new(TrustedOriginSet::from_config(&self.config.app)?);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let tokens = self.tokens.unwrap_or_else(|| {
            Arc::new(TokenStore::with_sources(
                self.config.csrf.max_age(),
                self.config.app.cookie_domain.clone(),
                Arc::new(OsEntropy),
                clock.clone(),
            ))
        });
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::with_clock(&self.config.rate_limit, clock.clone())));

        Ok(Guard {
            state: AtomicU8::new(GuardState::Uninitialized as u8),
            tokens,
            limiter,
            origins,
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Arc::new(ReqwestDispatcher::new())),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            clock,
            headers: OnceLock::new(),
            monitors: OnceLock::new(),
        })
    }
}

/// The orchestrator. Cheap to share behind an `Arc`.
pub struct Guard {
    state: AtomicU8,
    tokens: Arc<TokenStore>,
    limiter: Arc<RateLimiter>,
    origins: Arc<TrustedOriginSet>,
    dispatcher: Arc<dyn Dispatch>,
    sink: Arc<dyn SecuritySink>,
    clock: Arc<dyn Clock>,
    headers: OnceLock<SecurityHeaders>,
    monitors: OnceLock<Monitors>,
}

impl Guard {
    pub fn builder(config: &ShieldConfig) -> GuardBuilder {
        GuardBuilder {
            config: config.clone(),
            tokens: None,
            limiter: None,
            dispatcher: None,
            sink: None,
            clock: None,
        }
    }

    /// The process-wide guard, wired to the process-wide token store and
    /// rate limiter. Call [`Guard::initialize`] on it once at startup.
    pub fn global(config: &ShieldConfig) -> Result<Arc<Guard>, GuardError> {
        GLOBAL.get_or_try_init(|| {
            Guard::builder(config)
                .token_store(TokenStore::global(config))
                .rate_limiter(RateLimiter::global(config))
                .build()
        })
    }

    pub fn reset_global_for_testing() {
        GLOBAL.reset();
    }

    pub fn state(&self) -> GuardState {
        GuardState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == GuardState::Active
    }

    /// Mint the token, compute the header set, install monitors and go
    /// active. Calls after the first are no-ops.
    ///
    /// A caller that arrives while another is mid-initialization waits for
    /// it; `Ok` always means the guard is active.
    pub fn initialize(&self) -> Result<(), GuardError> {
        loop {
            let claimed = self.state.compare_exchange(
                GuardState::Uninitialized as u8,
                GuardState::Initializing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            match claimed.map_err(GuardState::from) {
                Ok(_) => break,
                Err(GuardState::Active) => {
                    tracing::debug!("Guard already initialized");
                    return Ok(());
                }
                Err(GuardState::Initializing) => std::thread::yield_now(),
                // The other attempt failed; try again ourselves.
                Err(GuardState::Uninitialized) => {}
            }
        }

        if let Err(e) = self.tokens.get_token() {
            self.state.store(GuardState::Uninitialized as u8, Ordering::Release);
            tracing::error!(error = %e, "Guard initialization aborted");
            return Err(e);
        }

        let headers = self
            .headers
            .get_or_init(|| SecurityHeaders::build(&self.origins));

        self.monitors.get_or_init(|| Monitors {
            errors: ErrorMonitor::new(self.limiter.clone(), self.sink.clone(), self.clock.clone()),
            dom: Arc::new(DomMonitor::new(self.sink.clone(), self.clock.clone())),
            network: NetworkMonitor::new(
                self.origins.clone(),
                self.tokens.clone(),
                self.dispatcher.clone(),
                self.sink.clone(),
                self.clock.clone(),
            ),
        });

        self.state.store(GuardState::Active as u8, Ordering::Release);
        tracing::info!(
            base_url = %self.origins.base(),
            trusted_hosts = self.origins.auxiliary_hosts().count(),
            security_headers = headers.len(),
            "Guard active"
        );
        Ok(())
    }

    fn monitors(&self) -> Result<&Monitors, GuardError> {
        if !self.is_active() {
            return Err(GuardError::NotActive);
        }
        self.monitors.get().ok_or(GuardError::NotActive)
    }

    /// The declared response header set, once initialized.
    pub fn security_headers(&self) -> Option<&SecurityHeaders> {
        self.headers.get()
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn trusted_origins(&self) -> &TrustedOriginSet {
        &self.origins
    }

    /// Token valid, caller not rate limited, target trusted; first failure wins.
    pub fn check_request(&self, request: &OutboundRequest) -> Result<(), Rejection> {
        let result = self.evaluate(request);
        if let Err(rejection) = &result {
            metrics::record_rejection(rejection.label());
            let event = SecurityEvent::new(
                SecurityEventKind::RequestRejected,
                Severity::Info,
                self.clock.wall(),
            )
            .with("reason", rejection.label())
            .with("target", request.target.clone())
            .with("identity", request.identity.as_deref().unwrap_or(ANONYMOUS));
            self.sink.emit(&event);
        }
        result
    }

    fn evaluate(&self, request: &OutboundRequest) -> Result<(), Rejection> {
        let token = request.csrf_token().ok_or(Rejection::MissingToken)?;
        if !self.tokens.validate(token) {
            return Err(Rejection::InvalidToken);
        }

        let identity = request.identity.as_deref().unwrap_or(ANONYMOUS);
        if self.limiter.is_rate_limited(identity, false) {
            return Err(Rejection::RateLimited {
                identity: identity.to_string(),
            });
        }

        self.origins.check(&request.target).map(|_| ())
    }

    /// Boolean form of [`Guard::check_request`].
    pub fn validate_request(&self, request: &OutboundRequest) -> bool {
        self.check_request(request).is_ok()
    }

    pub fn sanitize_input(&self, input: &str, context: SanitizationContext) -> String {
        sanitize_text(input, context)
    }

    pub fn sanitize_fields(
        &self,
        obj: &Map<String, Value>,
        schema: &HashMap<String, SanitizationContext>,
    ) -> Map<String, Value> {
        sanitize_object(obj, schema)
    }

    /// Send a request through the network monitor.
    pub async fn dispatch(&self, request: OutboundRequest) -> Result<OutboundResponse, DispatchError> {
        let monitors = self.monitors()?;
        monitors.network.dispatch(request).await
    }

    /// Attach the DOM monitor to a document.
    pub fn observe(&self, document: &mut Document) -> Result<(), GuardError> {
        let monitors = self.monitors()?;
        document.observe(monitors.dom.clone());
        Ok(())
    }

    /// Feed an uncaught error to the error monitor. Returns true if it was
    /// judged suspicious. Ignored before activation.
    pub fn report_error(&self, report: &ErrorReport) -> bool {
        match self.monitors() {
            Ok(monitors) => monitors.errors.inspect(report).is_some(),
            Err(_) => {
                tracing::debug!(message = %report.message, "Error report ignored; guard not active");
                false
            }
        }
    }

    /// Route panics through the error monitor, then the previous hook.
    pub fn install_panic_hook(self: &Arc<Self>) {
        let guard: Weak<Guard> = Arc::downgrade(self);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if let Some(guard) = guard.upgrade() {
                let message = info
                    .payload()
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| info.payload().downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                let mut report = ErrorReport::new(message);
                if let Some(location) = info.location() {
                    report = report.source(location.to_string());
                }
                guard.report_error(&report);
            }
            previous(info);
        }));
    }
}
