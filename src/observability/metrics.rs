//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shield_security_events_total` (counter): events by kind
//! - `shield_requests_rejected_total` (counter): rejections by reason
//! - `shield_rate_limited_total` (counter): limited calls by cause
//! - `shield_cache_lookups_total` (counter): lookups by outcome
//! - `shield_cache_evictions_total` (counter): removals by cause
//! - `shield_cache_entries` (gauge): current entry count
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_security_event(kind: &'static str) {
    counter!("shield_security_events_total", "kind" => kind).increment(1);
}

pub fn record_rejection(reason: &'static str) {
    counter!("shield_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(cause: &'static str) {
    counter!("shield_rate_limited_total", "cause" => cause).increment(1);
}

pub fn record_cache_lookup(outcome: &'static str) {
    counter!("shield_cache_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_eviction(cause: &'static str, count: usize) {
    counter!("shield_cache_evictions_total", "cause" => cause).increment(count as u64);
}

pub fn record_cache_size(size: usize) {
    gauge!("shield_cache_entries").set(size as f64);
}
