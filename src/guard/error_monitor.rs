//! Inspection of uncaught error reports.

use std::sync::Arc;

use crate::clock::Clock;
use crate::observability::{SecurityEvent, SecurityEventKind, SecuritySink, Severity};
use crate::security::{RateLimiter, ANONYMOUS};

/// Substrings that suggest an error was caused by injected script.
/// Matched case-insensitively against message and stack.
pub const SUSPICIOUS_MARKERS: [&str; 8] = [
    "<script",
    "javascript:",
    "vbscript:",
    "data:text/html",
    "eval(",
    "new function(",
    "document.write(",
    "document.cookie",
];

/// An uncaught error as reported by the host.
#[derive(Debug, Clone, Default)]
pub struct ErrorReport {
    pub message: String,
    pub stack: Option<String>,
    /// Where the error originated (file, script URL, panic location).
    pub source: Option<String>,
    /// Identity to block if the report looks malicious.
    pub identity: Option<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

/// Flags error reports that match a suspicious marker.
pub struct ErrorMonitor {
    limiter: Arc<RateLimiter>,
    sink: Arc<dyn SecuritySink>,
    clock: Arc<dyn Clock>,
}

impl ErrorMonitor {
    pub fn new(limiter: Arc<RateLimiter>, sink: Arc<dyn SecuritySink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            limiter,
            sink,
            clock,
        }
    }

    /// Inspect a report. On a match the event is emitted, the identity is
    /// force-blocked and the matched marker returned.
    pub fn inspect(&self, report: &ErrorReport) -> Option<&'static str> {
        let marker = find_marker(&report.message)
            .or_else(|| report.stack.as_deref().and_then(find_marker))?;
        let identity = report.identity.as_deref().unwrap_or(ANONYMOUS);

        let mut event = SecurityEvent::new(
            SecurityEventKind::SuspiciousError,
            Severity::Critical,
            self.clock.wall(),
        )
        .with("marker", marker)
        .with("message", report.message.clone())
        .with("identity", identity);
        if let Some(source) = &report.source {
            event = event.with("source", source.clone());
        }
        self.sink.emit(&event);

        self.limiter.is_rate_limited(identity, true);
        Some(marker)
    }
}

fn find_marker(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    SUSPICIOUS_MARKERS
        .iter()
        .copied()
        .find(|marker| lowered.contains(marker))
}
