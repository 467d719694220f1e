//! Security events and the sink they are reported to.
//!
//! Events are ephemeral: the core builds one, hands it to a
//! [`SecuritySink`], and forgets it.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::observability::metrics;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// An error report matched a suspicious marker.
    SuspiciousError,
    /// A dangerous element was removed from a document.
    DangerousElementRemoved,
    /// An inline handler attribute was stripped from an element.
    DangerousAttributeRemoved,
    /// An outbound call to an untrusted host was refused.
    UntrustedOriginBlocked,
    /// A request failed validation.
    RequestRejected,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::SuspiciousError => "suspicious_error",
            SecurityEventKind::DangerousElementRemoved => "dangerous_element_removed",
            SecurityEventKind::DangerousAttributeRemoved => "dangerous_attribute_removed",
            SecurityEventKind::UntrustedOriginBlocked => "untrusted_origin_blocked",
            SecurityEventKind::RequestRejected => "request_rejected",
        }
    }
}

/// Log level the sink should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// An ephemeral record of a security-relevant occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub kind: SecurityEventKind,
    pub severity: Severity,
    pub details: BTreeMap<String, Value>,
    #[serde(serialize_with = "serialize_epoch_millis")]
    pub timestamp: SystemTime,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind, severity: Severity, timestamp: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            details: BTreeMap::new(),
            timestamp,
        }
    }

    /// Attach a detail field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Human-readable summary used as the log message.
    pub fn message(&self) -> String {
        format!("security event: {}", self.kind.as_str())
    }
}

fn serialize_epoch_millis<S: serde::Serializer>(
    ts: &SystemTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let millis = ts
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    serializer.serialize_u64(millis)
}

/// The logging/monitoring collaborator.
pub trait SecuritySink: Send + Sync {
    fn emit(&self, event: &SecurityEvent);
}

/// Default sink: structured `tracing` output plus a metrics counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SecuritySink for TracingSink {
    fn emit(&self, event: &SecurityEvent) {
        let details = serde_json::to_string(&event.details).unwrap_or_default();
        match event.severity {
            Severity::Info => tracing::info!(
                event_id = %event.id,
                kind = event.kind.as_str(),
                details = %details,
                "{}",
                event.message()
            ),
            Severity::Warning => tracing::warn!(
                event_id = %event.id,
                kind = event.kind.as_str(),
                details = %details,
                "{}",
                event.message()
            ),
            Severity::Critical => tracing::error!(
                event_id = %event.id,
                kind = event.kind.as_str(),
                details = %details,
                "{}",
                event.message()
            ),
        }
        metrics::record_security_event(event.kind.as_str());
    }
}

/// Sink that keeps events in memory. Useful in tests and for hosts that
/// batch reports themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().expect("memory sink mutex poisoned").clone()
    }

    pub fn count(&self, kind: SecurityEventKind) -> usize {
        self.events
            .lock()
            .expect("memory sink mutex poisoned")
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl SecuritySink for MemorySink {
    fn emit(&self, event: &SecurityEvent) {
        self.events
            .lock()
            .expect("memory sink mutex poisoned")
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_epoch_timestamp() {
        let event = SecurityEvent::new(
            SecurityEventKind::UntrustedOriginBlocked,
            Severity::Warning,
            UNIX_EPOCH + std::time::Duration::from_millis(1_500),
        )
        .with("host", "evil.example.net");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "untrusted_origin_blocked");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["timestamp"], 1_500);
        assert_eq!(json["details"]["host"], "evil.example.net");
    }

    #[test]
    fn test_memory_sink_counts_by_kind() {
        let sink = MemorySink::new();
        let now = SystemTime::now();
        sink.emit(&SecurityEvent::new(SecurityEventKind::SuspiciousError, Severity::Critical, now));
        sink.emit(&SecurityEvent::new(SecurityEventKind::SuspiciousError, Severity::Critical, now));
        sink.emit(&SecurityEvent::new(SecurityEventKind::RequestRejected, Severity::Info, now));

        assert_eq!(sink.count(SecurityEventKind::SuspiciousError), 2);
        assert_eq!(sink.events().len(), 3);
    }
}
