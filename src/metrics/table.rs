//! TableCache Metrics
//!
//! The table's map is behind a read-write lock and most lookups only take the
//! read side, so these counters are atomics.

use super::{CacheMetrics, CoreCacheMetrics};
use std::collections::BTreeMap;
use std::string::{String, ToString};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a [`TableCache`](crate::TableCache).
#[derive(Debug, Default)]
pub struct TableCacheMetrics {
    requests: AtomicU64,
    hits: AtomicU64,
    loads: AtomicU64,
    additions: AtomicU64,
    deletions: AtomicU64,
    vetoes: AtomicU64,
    expirations: AtomicU64,
    sweeps: AtomicU64,
}

macro_rules! counter {
    ($record:ident, $get:ident, $field:ident) => {
        #[inline]
        pub(crate) fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        #[doc = concat!("Current value of the `", stringify!($field), "` counter.")]
        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl TableCacheMetrics {
    counter!(record_request, requests, requests);
    counter!(record_hit, hits, hits);
    counter!(record_load, loads, loads);
    counter!(record_addition, additions, additions);
    counter!(record_deletion, deletions, deletions);
    counter!(record_veto, vetoes, vetoes);
    counter!(record_sweep, sweeps, sweeps);

    #[inline]
    pub(crate) fn record_expirations(&self, n: u64) {
        self.expirations.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value of the `expirations` counter.
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Copies the counters shared with the other engine into a
    /// [`CoreCacheMetrics`].
    pub fn core(&self) -> CoreCacheMetrics {
        CoreCacheMetrics {
            requests: self.requests(),
            cache_hits: self.hits(),
            insertions: self.additions(),
            evictions: 0,
            expirations: self.expirations(),
            deletions: self.deletions(),
        }
    }
}

impl CacheMetrics for TableCacheMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.core().to_btreemap();
        metrics.insert("loads".to_string(), self.loads() as f64);
        metrics.insert("sweeps".to_string(), self.sweeps() as f64);
        metrics.insert("vetoes".to_string(), self.vetoes() as f64);
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "TableCache"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_metrics_counters() {
        let m = TableCacheMetrics::default();
        m.record_request();
        m.record_request();
        m.record_hit();
        m.record_veto();
        m.record_expirations(4);

        assert_eq!(m.requests(), 2);
        assert_eq!(m.core().hit_rate(), 0.5);

        let map = m.metrics();
        assert_eq!(map["vetoes"], 1.0);
        assert_eq!(map["expirations"], 4.0);
        assert_eq!(map["evictions"], 0.0);
    }
}
