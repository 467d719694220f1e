//! TTL cache with stale-while-revalidate reads and bounded capacity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time;

use crate::cache::entry::{CacheEntry, Cached, Freshness};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::lifecycle::{Shutdown, Singleton};
use crate::observability::metrics;

struct Entries<V> {
    map: HashMap<String, CacheEntry<V>>,
    next_seq: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    /// Entries removed to make room.
    pub evictions: u64,
    /// Dead entries removed on read or by the sweeper.
    pub expirations: u64,
}

struct Sweeper {
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

static GLOBAL: Singleton<Cache<Value>> = Singleton::new();

/// Key/value cache. Values are cloned out on read.
pub struct Cache<V> {
    entries: Mutex<Entries<V>>,
    ttl: Duration,
    stale_window: Duration,
    max_size: usize,
    sweep_interval: Duration,
    clock: Arc<dyn Clock>,
    counters: Counters,
    sweeper: Mutex<Option<Sweeper>>,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                next_seq: 0,
            }),
            ttl: config.ttl(),
            stale_window: config.stale_window(),
            max_size: config.max_size.max(1),
            sweep_interval: config.sweep_interval(),
            clock,
            counters: Counters::default(),
            sweeper: Mutex::new(None),
        }
    }

    /// Insert or overwrite `key` with the default TTL.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    /// Insert or overwrite `key` with an explicit TTL.
    ///
    /// When the cache is full and `key` is new, the oldest-inserted entry is
    /// evicted first.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");

        if !entries.map.contains_key(key) && entries.map.len() >= self.max_size {
            let oldest = entries
                .map
                .values()
                .min_by_key(|e| (e.created_at, e.seq))
                .map(|e| e.key.clone());
            if let Some(oldest) = oldest {
                entries.map.remove(&oldest);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_eviction("capacity", 1);
                tracing::debug!(key = %oldest, "Evicted oldest cache entry");
            }
        }

        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.map.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value,
                created_at: now,
                ttl,
                stale_window: self.stale_window,
                seq,
            },
        );
        metrics::record_cache_size(entries.map.len());
    }

    /// Value for `key` if fresh or stale-but-usable. Dead entries are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key).map(|cached| cached.value)
    }

    /// Like [`Cache::get`], but also reports whether the value is stale so the
    /// caller can decide to revalidate. The cache never refreshes by itself.
    pub fn lookup(&self, key: &str) -> Option<Cached<V>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");

        let freshness = match entries.map.get(key) {
            Some(entry) => entry.freshness(now),
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("miss");
                return None;
            }
        };

        match freshness {
            Freshness::Dead => {
                entries.map.remove(key);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("expired");
                metrics::record_cache_size(entries.map.len());
                None
            }
            Freshness::Fresh | Freshness::Stale => {
                if freshness == Freshness::Stale {
                    self.counters.stale_hits.fetch_add(1, Ordering::Relaxed);
                    metrics::record_cache_lookup("stale");
                } else {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::record_cache_lookup("hit");
                }
                entries.map.get(key).map(|entry| Cached {
                    value: entry.value.clone(),
                    freshness,
                })
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.map.remove(key);
        metrics::record_cache_size(entries.map.len());
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.map.clear();
        metrics::record_cache_size(0);
    }

    /// Remove every dead entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let before = entries.map.len();
        entries.map.retain(|_, entry| !entry.is_dead(now));
        let removed = before - entries.map.len();

        if removed > 0 {
            self.counters.expirations.fetch_add(removed as u64, Ordering::Relaxed);
            metrics::record_cache_eviction("expired", removed);
            tracing::debug!(removed, remaining = entries.map.len(), "Cache sweep");
        }
        metrics::record_cache_size(entries.map.len());
        removed
    }

    /// Spawn the periodic sweep on the current tokio runtime.
    ///
    /// Returns false if there is no runtime or a sweeper is already running.
    pub fn start_sweeper(self: &Arc<Self>) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime; cache sweeper not started");
            return false;
        };
        let mut sweeper = self.sweeper.lock().expect("cache sweeper mutex poisoned");
        if sweeper.is_some() {
            return false;
        }

        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let handle = runtime.spawn(run_sweeper(Arc::downgrade(self), self.sweep_interval, rx));
        *sweeper = Some(Sweeper { shutdown, handle });

        tracing::info!(interval_secs = self.sweep_interval.as_secs(), "Cache sweeper started");
        true
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .expect("cache sweeper mutex poisoned")
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }
}

impl<V> Cache<V> {
    /// Stop the background sweep. Entries are kept.
    pub fn shutdown(&self) {
        let sweeper = self.sweeper.lock().expect("cache sweeper mutex poisoned").take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown.trigger();
            sweeper.handle.abort();
            tracing::info!("Cache sweeper stopped");
        }
    }
}

impl Cache<Value> {
    /// The process-wide cache.
    pub fn global(config: &CacheConfig) -> Arc<Cache<Value>> {
        GLOBAL.get_or_init(|| Cache::new(config))
    }

    /// The process-wide cache with its sweeper running (if a runtime exists).
    pub fn init_global(config: &CacheConfig) -> Arc<Cache<Value>> {
        let cache = Self::global(config);
        if !cache.is_sweeping() {
            cache.start_sweeper();
        }
        cache
    }

    /// Drop the process-wide instance, stopping its sweeper.
    pub fn reset_global_for_testing() {
        if let Some(cache) = GLOBAL.reset() {
            cache.shutdown();
        }
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        if let Ok(slot) = self.sweeper.get_mut() {
            if let Some(sweeper) = slot.take() {
                sweeper.shutdown.trigger();
                sweeper.handle.abort();
            }
        }
    }
}

async fn run_sweeper<V: Clone + Send + Sync + 'static>(
    cache: Weak<Cache<V>>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match cache.upgrade() {
                    Some(cache) => {
                        cache.sweep();
                    }
                    None => break,
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Cache sweeper received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);

    fn cache(max_size: usize) -> (Cache<String>, Arc<ManualClock>) {
        let clock = ManualClock::shared();
        let config = CacheConfig {
            ttl_secs: 5 * 60,
            stale_secs: 25 * 60,
            max_size,
            sweep_interval_secs: 60,
        };
        (Cache::with_clock(&config, clock.clone()), clock)
    }

    #[test]
    fn test_freshness_timeline() {
        let (cache, clock) = cache(10);
        cache.set("items", "v1".to_string());

        clock.advance(4 * MINUTE);
        assert_eq!(cache.get("items").as_deref(), Some("v1"));

        clock.advance(16 * MINUTE);
        let cached = cache.lookup("items").unwrap();
        assert_eq!(cached.value, "v1");
        assert!(cached.needs_revalidation());

        clock.advance(11 * MINUTE);
        assert_eq!(cache.get("items"), None);
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.stale_hits, stats.misses, stats.expirations), (1, 1, 1, 1));
    }

    #[test]
    fn test_evicts_first_inserted() {
        let (cache, _clock) = cache(3);
        for key in ["a", "b", "c", "d"] {
            cache.set(key, key.to_uppercase());
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        for key in ["b", "c", "d"] {
            assert_eq!(cache.get(key), Some(key.to_uppercase()));
        }
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_ignores_reads() {
        let (cache, clock) = cache(2);
        cache.set("a", "1".into());
        clock.advance(Duration::from_secs(1));
        cache.set("b", "2".into());
        cache.get("a");
        cache.set("c", "3".into());

        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let (cache, _clock) = cache(2);
        cache.set("a", "1".into());
        cache.set("b", "2".into());
        cache.set("a", "1b".into());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").as_deref(), Some("1b"));
        assert_eq!(cache.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_ttl_override_and_invalidate() {
        let (cache, clock) = cache(10);
        cache.set_with_ttl("short", "s".into(), Duration::from_secs(1));
        cache.set("long", "l".into());
        cache.set("gone", "g".into());

        cache.invalidate("gone");
        assert_eq!(cache.get("gone"), None);

        clock.advance(Duration::from_secs(1) + 25 * MINUTE);
        assert_eq!(cache.get("short"), None);
        assert!(cache.get("long").is_some());

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_removes_unread_dead_entries() {
        let (cache, clock) = cache(10);
        cache.set("a", "1".into());
        cache.set("b", "2".into());
        clock.advance(29 * MINUTE);
        cache.set("c", "3".into());
        clock.advance(2 * MINUTE);

        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_runs_and_stops() {
        let (cache, clock) = cache(10);
        let cache = Arc::new(cache);
        cache.set("a", "1".into());
        assert!(cache.start_sweeper());
        assert!(!cache.start_sweeper());

        clock.advance(31 * MINUTE);
        time::sleep(Duration::from_secs(61)).await;
        assert!(cache.is_empty());

        cache.shutdown();
        tokio::task::yield_now().await;
        assert!(!cache.is_sweeping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_instance_lifecycle() {
        Cache::reset_global_for_testing();
        let config = CacheConfig::default();

        let first = Cache::global(&config);
        assert!(Arc::ptr_eq(&first, &Cache::global(&config)));
        assert!(!first.is_sweeping());

        let started = Cache::init_global(&config);
        assert!(Arc::ptr_eq(&first, &started));
        assert!(started.is_sweeping());
        started.set("k", Value::from(1));

        Cache::reset_global_for_testing();
        tokio::task::yield_now().await;
        assert!(!started.is_sweeping());

        let fresh = Cache::global(&config);
        assert!(!Arc::ptr_eq(&started, &fresh));
        assert!(fresh.is_empty());
        assert!(!fresh.is_sweeping());

        Cache::reset_global_for_testing();
    }

    #[test]
    fn test_sweeper_needs_runtime() {
        let (cache, _clock) = cache(10);
        assert!(!Arc::new(cache).start_sweeper());
    }
}
