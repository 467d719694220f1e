//! Cache entries and their freshness.

use std::time::{Duration, Instant};

/// Where an entry sits on its freshness timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `now < created_at + ttl`
    Fresh,
    /// `created_at + ttl <= now < created_at + ttl + stale_window`
    Stale,
    /// Past the stale window; treated as absent.
    Dead,
}

/// A stored value with its timing metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
    pub stale_window: Duration,
    /// Insertion sequence; breaks `created_at` ties during eviction.
    pub seq: u64,
}

impl<V> CacheEntry<V> {
    pub fn freshness(&self, now: Instant) -> Freshness {
        let age = now.saturating_duration_since(self.created_at);
        if age < self.ttl {
            Freshness::Fresh
        } else if age < self.ttl + self.stale_window {
            Freshness::Stale
        } else {
            Freshness::Dead
        }
    }

    pub fn is_dead(&self, now: Instant) -> bool {
        self.freshness(now) == Freshness::Dead
    }
}

/// A value served from the cache together with its freshness.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    pub freshness: Freshness,
}

impl<V> Cached<V> {
    /// True when the caller should refresh the value out of band.
    pub fn needs_revalidation(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}
