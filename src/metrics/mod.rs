//! Cache Metrics System
//!
//! Counters for both engines, reported through the [`CacheMetrics`] trait as a
//! `BTreeMap<String, f64>`.
//!
//! # Why BTreeMap over HashMap?
//!
//! BTreeMap is used instead of HashMap for deterministic ordering: metrics
//! always appear in the same order, which keeps logs and test assertions
//! stable. With a dozen keys the O(log n) lookup cost is irrelevant.

use std::collections::BTreeMap;
use std::string::{String, ToString};

pub mod fast;
pub mod table;

pub use fast::FastCacheMetrics;
pub use table::TableCacheMetrics;

/// Counters shared by every engine.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoreCacheMetrics {
    /// Total number of lookups.
    pub requests: u64,

    /// Lookups that found a live entry.
    pub cache_hits: u64,

    /// Writes that created a new entry.
    pub insertions: u64,

    /// Entries dropped to make room for new ones.
    pub evictions: u64,

    /// Entries removed because their lifetime ran out.
    pub expirations: u64,

    /// Entries removed by an explicit delete.
    pub deletions: u64,
}

impl CoreCacheMetrics {
    /// Records a lookup that found a live entry.
    #[inline]
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.cache_hits += 1;
    }

    /// Records a lookup that found nothing.
    ///
    /// Misses are derived as `requests - cache_hits`.
    #[inline]
    pub fn record_miss(&mut self) {
        self.requests += 1;
    }

    /// Records a write that created a new entry.
    #[inline]
    pub fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    /// Records a capacity eviction.
    #[inline]
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Records `n` expired entries.
    #[inline]
    pub fn record_expirations(&mut self, n: u64) {
        self.expirations += n;
    }

    /// Records an explicit delete.
    #[inline]
    pub fn record_deletion(&mut self) {
        self.deletions += 1;
    }

    /// Adds every counter of `other` into `self`.
    pub fn merge(&mut self, other: &CoreCacheMetrics) {
        self.requests += other.requests;
        self.cache_hits += other.cache_hits;
        self.insertions += other.insertions;
        self.evictions += other.evictions;
        self.expirations += other.expirations;
        self.deletions += other.deletions;
    }

    /// Hit ratio between 0.0 and 1.0, or 0.0 before any request.
    pub fn hit_rate(&self) -> f64 {
        if self.requests > 0 {
            self.cache_hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Miss ratio between 0.0 and 1.0, or 0.0 before any request.
    pub fn miss_rate(&self) -> f64 {
        if self.requests > 0 {
            (self.requests - self.cache_hits) as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Converts the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("cache_hits".to_string(), self.cache_hits as f64);
        metrics.insert(
            "cache_misses".to_string(),
            (self.requests - self.cache_hits) as f64,
        );
        metrics.insert("deletions".to_string(), self.deletions as f64);
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("expirations".to_string(), self.expirations as f64);
        metrics.insert("insertions".to_string(), self.insertions as f64);
        metrics.insert("requests".to_string(), self.requests as f64);

        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert("miss_rate".to_string(), self.miss_rate());

        metrics
    }
}

/// Uniform metrics reporting for both engines.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Engine name for identification (e.g. "FastCache").
    fn algorithm_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_without_requests() {
        let m = CoreCacheMetrics::default();
        assert_eq!(m.hit_rate(), 0.0);
        assert_eq!(m.miss_rate(), 0.0);
    }

    #[test]
    fn test_hit_and_miss_accounting() {
        let mut m = CoreCacheMetrics::default();
        m.record_hit();
        m.record_hit();
        m.record_hit();
        m.record_miss();
        assert_eq!(m.requests, 4);
        assert_eq!(m.hit_rate(), 0.75);

        let map = m.to_btreemap();
        assert_eq!(map["cache_misses"], 1.0);
        assert_eq!(map["cache_hits"], 3.0);
    }

    #[test]
    fn test_merge() {
        let mut a = CoreCacheMetrics::default();
        a.record_insertion();
        a.record_expirations(3);
        let mut b = CoreCacheMetrics::default();
        b.record_eviction();
        b.record_deletion();
        b.record_insertion();
        a.merge(&b);
        assert_eq!(a.insertions, 2);
        assert_eq!(a.expirations, 3);
        assert_eq!(a.evictions, 1);
        assert_eq!(a.deletions, 1);
    }
}
