//! Response cache for data-fetching call sites.
//!
//! # Data Flow
//! ```text
//! set(key, value)  → entry stamped with created_at/ttl/stale_window
//!                  → oldest-inserted entry evicted when full
//! get(key)         → fresh | stale → value
//!                  → dead → removed, miss
//! sweeper (60s)    → removes every dead entry
//! ```
//!
//! # Design Decisions
//! - Stale values are served, never refreshed here; callers revalidate
//! - Eviction is by insertion order, not recency of use
//! - Independent of the guard; its own singleton

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, Cached, Freshness};
pub use store::{Cache, CacheStats};
