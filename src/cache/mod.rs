//! Row count cache.
//!
//! Counting every matching artist is the expensive half of a list request,
//! and the count does not change while a user pages or re-sorts. Counts are
//! cached per (tenant, mute mode, filter items) for a short TTL.
//!
//! # Design
//!
//! - Concurrent map, injected into the service (never a global)
//! - Entries older than the TTL are misses and get replaced
//! - Bounded: on overflow, expired entries go first, then the oldest
//! - Bulk mutations invalidate every entry of the affected tenant

mod hash;
pub use hash::{compute_hash, count_key};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct CachedCount {
    tenant: String,
    count: u64,
    computed_at: Instant,
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hit rate between 0.0 and 1.0.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Bounded TTL cache of row counts keyed by [`count_key`].
#[derive(Debug)]
pub struct PlanCache {
    entries: DashMap<String, CachedCount>,
    ttl: Duration,
    max_entries: usize,
    stats: CacheStats,
}

impl PlanCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
            stats: CacheStats::default(),
        }
    }

    /// A count computed less than one TTL ago.
    pub fn get(&self, key: &str) -> Option<u64> {
        let fresh = self
            .entries
            .get(key)
            .filter(|entry| entry.computed_at.elapsed() < self.ttl)
            .map(|entry| entry.count);

        match fresh {
            Some(_) => self.stats.hits.fetch_add(1, Ordering::Relaxed),
            None => self.stats.misses.fetch_add(1, Ordering::Relaxed),
        };
        fresh
    }

    /// Store a freshly computed count, replacing any previous one.
    pub fn insert(&self, key: String, tenant: &str, count: u64) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.evict();
        }
        self.entries.insert(
            key,
            CachedCount {
                tenant: tenant.into(),
                count,
                computed_at: Instant::now(),
            },
        );
    }

    /// Drop every count of one tenant.
    pub fn invalidate_tenant(&self, tenant: &str) {
        self.entries.retain(|_, entry| entry.tenant != tenant);
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make room for one entry: expired entries first, then the oldest.
    fn evict(&self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.computed_at.elapsed() < self.ttl);
        let mut evicted = before.saturating_sub(self.entries.len());

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.computed_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }

        self.stats
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }
}
