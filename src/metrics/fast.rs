//! FastCache Metrics
//!
//! Each shard owns one [`FastCacheMetrics`] and mutates it under the shard
//! lock, so no atomics are needed. [`FastCache::metrics`](crate::FastCache)
//! merges the per-shard values.

use super::{CacheMetrics, CoreCacheMetrics};
use std::collections::BTreeMap;
use std::string::{String, ToString};

/// Counters for the sharded LRU.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FastCacheMetrics {
    /// Core metrics common to both engines
    pub core: CoreCacheMetrics,
    /// Writes that replaced the value of an existing key
    pub updates: u64,
    /// Primary hits moved into the secondary tier
    pub promotions: u64,
}

impl FastCacheMetrics {
    /// Records an overwrite of an existing key.
    #[inline]
    pub fn record_update(&mut self) {
        self.updates += 1;
    }

    /// Records a primary-to-secondary promotion.
    #[inline]
    pub fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    /// Adds every counter of `other` into `self`.
    pub fn merge(&mut self, other: &FastCacheMetrics) {
        self.core.merge(&other.core);
        self.updates += other.updates;
        self.promotions += other.promotions;
    }

    /// Converts the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.core.to_btreemap();
        metrics.insert("promotions".to_string(), self.promotions as f64);
        metrics.insert("updates".to_string(), self.updates as f64);
        metrics
    }
}

impl CacheMetrics for FastCacheMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "FastCache"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_metrics_report() {
        let mut m = FastCacheMetrics::default();
        m.core.record_hit();
        m.record_promotion();
        m.record_update();
        m.record_update();

        let map = m.metrics();
        assert_eq!(map["promotions"], 1.0);
        assert_eq!(map["updates"], 2.0);
        assert_eq!(map["requests"], 1.0);
        assert_eq!(m.algorithm_name(), "FastCache");
    }
}
