use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// Bounded cache keyed by normalized query text. Entries expire after `ttl`.
pub struct QueryCache<V> {
    inner: Mutex<Inner<V>>,
    ttl: Duration,
}

/// Case, surrounding whitespace, runs of whitespace and a trailing `;` do
/// not change the key.
pub fn normalize_key(query: &str) -> String {
    query
        .trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl<V: Clone> QueryCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, query: &str) -> Option<V> {
        let key = normalize_key(query);
        let mut inner = self.lock();

        let fresh = inner
            .entries
            .get(&key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone());

        if fresh.is_some() {
            inner.hits += 1;
        } else {
            inner.entries.pop(&key);
            inner.misses += 1;
        }
        fresh
    }

    /// Insert a result. Expired entries are swept first so they never push
    /// a live entry out of the LRU order.
    pub fn set(&self, query: &str, value: V) {
        let mut inner = self.lock();
        let swept = Self::sweep_expired(&mut inner.entries, self.ttl);
        if swept > 0 {
            tracing::debug!(target: "sluice::tools::cache", "Swept {} expired entries", swept);
        }
        inner.entries.put(
            normalize_key(query),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn sweep_expired(entries: &mut LruCache<String, CacheEntry<V>>, ttl: Duration) -> usize {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }
}

impl<V> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
