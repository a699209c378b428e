//! In-memory TTL cache for provider lookups.
//!
//! Expiry is lazy: an expired entry is dropped when it is next read, or by
//! [`TtlCache::purge_expired`] (optionally on a background sweeper). The
//! clock is `tokio::time::Instant`, so tests can drive expiry with a paused
//! runtime.
//!
//! There is no single-flight coalescing. Concurrent misses on the same key
//! each run their compute function and the last write wins.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
    hits: u64,
}

impl<V> CacheEntry<V> {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Counters reported by [`TtlCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Entries dropped because their TTL ran out
    pub expired: u64,
    /// Live entries currently stored (may include not-yet-swept expired ones)
    pub keys: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    expired: AtomicU64,
}

/// String-keyed cache with per-entry TTL and a size bound.
pub struct TtlCache<V> {
    entries: Mutex<FxHashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    max_entries: usize,
    counters: Counters,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            default_ttl,
            max_entries: max_entries.max(1),
            counters: Counters::default(),
        }
    }

    pub fn from_config(config: &crate::config::CacheConfig) -> Self {
        Self::new(config.default_ttl(), config.max_entries)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry. Expired entries are removed and count as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.hits += 1;
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value. `ttl` of `None` uses the cache default.
    ///
    /// When the cache is full and `key` is new, expired entries are purged
    /// first; if that frees nothing the oldest entry is evicted.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let purged = Self::purge_locked(&mut entries, now);
            self.counters.expired.fetch_add(purged as u64, Ordering::Relaxed);

            if entries.len() >= self.max_entries
                && let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(k, _)| k.clone())
            {
                log::debug!("Cache full, evicting '{}'", oldest);
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                hits: 0,
            },
        );
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delete(&self, key: &str) -> bool {
        let removed = self.entries.lock().remove(key).is_some();
        if removed {
            self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Whether a live entry exists. Does not touch hit/miss counters.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// `Ok` result. Errors are returned as-is and never cached.
    ///
    /// The lock is not held while `compute` runs.
    pub async fn wrap<F, Fut, E>(&self, key: &str, ttl: Option<Duration>, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let purged = Self::purge_locked(&mut self.entries.lock(), Instant::now());
        self.counters.expired.fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    fn purge_locked(entries: &mut FxHashMap<String, CacheEntry<V>>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Hits recorded against a single key, if it is present.
    pub fn key_hits(&self, key: &str) -> Option<u64> {
        self.entries.lock().get(key).map(|entry| entry.hits)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            keys: self.len(),
        }
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Periodically purge expired entries on a background task.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    log::debug!("Cache sweeper purged {} expired entries", purged);
                }
            }
        })
    }
}

/// Build a composite cache key: `namespace:part1:part2:...`.
///
/// ```rust
/// use geopin::cache::cache_key;
///
/// let key = cache_key("poi", &[&51.5074, &-0.1278, &500.0, &"cultural"]);
/// assert_eq!(key, "poi:51.5074:-0.1278:500:cultural");
/// ```
pub fn cache_key(namespace: &str, parts: &[&dyn Display]) -> String {
    let mut key = String::from(namespace);
    for part in parts {
        key.push(':');
        key.push_str(&part.to_string());
    }
    key
}
