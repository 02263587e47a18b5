//! Search-by-id result cache.
//!
//! An LRU cache of [`SearchResponse`]s keyed by the stored record that was used as
//! the query. Any mutation of the index clears it. Each clear starts a new
//! generation; a response computed during an older generation is not stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use caiss_vector::ExternalId;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::SearchType;
use crate::engine::SearchResponse;

/// A unique key for cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// The record used as the query.
    pub external_id: ExternalId,
    /// Approximate or exact.
    pub search_type: SearchType,
    /// Number of results.
    pub k: usize,
    /// Effective beam width.
    pub ef: usize,
}

/// Hit, miss and eviction counters.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheMetrics {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of cache hits.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of cache misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of LRU evictions.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hits over lookups, or 0 with no lookups.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, SearchResponse>,
    /// Oldest first.
    lru_order: Vec<CacheKey>,
    generation: u64,
}

/// Thread-safe LRU cache of search-by-id results.
#[derive(Debug)]
pub struct SearchCache {
    capacity: usize,
    state: Mutex<CacheState>,
    metrics: CacheMetrics,
}

impl SearchCache {
    /// Create a cache holding at most `capacity` entries. `0` disables it.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, state: Mutex::new(CacheState::default()), metrics: CacheMetrics::default() }
    }

    /// Whether caching is enabled.
    pub const fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// The cache counters.
    pub const fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Look up `key`, refreshing its LRU position on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<SearchResponse> {
        if !self.is_enabled() {
            return None;
        }

        let mut state = self.state.lock();
        let Some(response) = state.entries.get(key).cloned() else {
            self.metrics.record_miss();
            return None;
        };
        if let Some(pos) = state.lru_order.iter().position(|k| k == key) {
            let k = state.lru_order.remove(pos);
            state.lru_order.push(k);
        }
        self.metrics.record_hit();
        Some(response)
    }

    /// The current generation. Read it before computing a response to insert.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Insert a response computed during `generation`, evicting the least
    /// recently used entry when full. Stale responses are dropped.
    pub fn insert(&self, key: CacheKey, response: SearchResponse, generation: u64) {
        if !self.is_enabled() {
            return;
        }

        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        if state.entries.insert(key.clone(), response).is_some() {
            if let Some(pos) = state.lru_order.iter().position(|k| *k == key) {
                state.lru_order.remove(pos);
            }
        }
        state.lru_order.push(key);

        while state.entries.len() > self.capacity && !state.lru_order.is_empty() {
            let oldest = state.lru_order.remove(0);
            state.entries.remove(&oldest);
            self.metrics.record_eviction();
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if !state.entries.is_empty() {
            debug!(entries = state.entries.len(), "search cache invalidated");
            state.entries.clear();
            state.lru_order.clear();
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
