//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Monitors and validators produce:
//!     → events.rs (SecurityEvent → SecuritySink)
//!     → metrics.rs (counters, gauges)
//!     → logging.rs (structured log output)
//! ```
//!
//! # Design Decisions
//! - The core never persists its own log; everything goes to the sink
//! - Structured fields for machine parsing
//! - Metrics are cheap (no-op without a recorder)

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{MemorySink, SecurityEvent, SecurityEventKind, SecuritySink, Severity, TracingSink};
