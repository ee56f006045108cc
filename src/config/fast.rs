//! Configuration for the sharded cache.
//!
//! # Examples
//!
//! ```
//! use tiercache::config::FastCacheConfig;
//! use tiercache::FastCache;
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! // Defaults: 4 shards of 1024 entries, no TTL, lazy background sweeper.
//! let cache = FastCache::init(FastCacheConfig::default(), None);
//!
//! // 16 shards of 10k entries, a 50k secondary tier and a 30s default TTL.
//! let config = FastCacheConfig::new(NonZeroUsize::new(10_000).unwrap())
//!     .with_buckets(16)
//!     .with_lru2_capacity(50_000)
//!     .with_default_ttl(Duration::from_secs(30));
//! let cache = FastCache::init(config, None);
//! assert_eq!(cache.bucket_count(), 16);
//! ```

use core::fmt;
use core::num::NonZeroUsize;
use std::time::Duration;

/// Configuration for a [`FastCache`](crate::FastCache).
///
/// # Fields
///
/// - `capacity`: primary LRU capacity **per shard**.
/// - `buckets`: number of shards, rounded up to a power of two.
/// - `lru2_capacity`: secondary LRU capacity per shard; `0` disables the tier.
/// - `default_ttl`: lifetime applied to writes without an explicit TTL;
///   `Duration::ZERO` means entries never expire.
/// - `auto_cleaner`: run a background sweeper that expires entries.
/// - `lazy_cleaner`: start the sweeper on the first write instead of at
///   construction.
/// - `idle_after`: stop the sweeper once every shard is empty and nothing was
///   written for this long.
/// - `sweep_interval`: time between sweeper ticks (one shard per tick);
///   defaults to `default_ttl`.
/// - `shrink_on_delete`: drop the key bytes of deleted slots right away.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FastCacheConfig {
    /// Primary LRU capacity per shard.
    pub capacity: NonZeroUsize,
    /// Requested shard count; rounded up to the next power of two.
    pub buckets: usize,
    /// Secondary LRU capacity per shard, `0` to disable.
    pub lru2_capacity: usize,
    /// Default entry lifetime, `Duration::ZERO` for never.
    pub default_ttl: Duration,
    /// Enable the background sweeper.
    pub auto_cleaner: bool,
    /// Defer starting the sweeper until the first write.
    pub lazy_cleaner: bool,
    /// Idle period after which an empty cache stops its sweeper.
    pub idle_after: Duration,
    /// Sweeper tick; `None` uses `default_ttl`.
    pub sweep_interval: Option<Duration>,
    /// Release key storage of deleted slots immediately.
    pub shrink_on_delete: bool,
}

impl FastCacheConfig {
    /// Default primary capacity per shard.
    pub const DEFAULT_CAPACITY: usize = 1024;
    /// Default shard count.
    pub const DEFAULT_BUCKETS: usize = 4;
    /// Default idle period before the sweeper stops itself.
    pub const DEFAULT_IDLE_AFTER: Duration = Duration::from_secs(30);

    /// Creates a configuration with the given per-shard capacity and default
    /// values for everything else.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Sets the shard count.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is 0.
    #[must_use]
    pub fn with_buckets(mut self, buckets: usize) -> Self {
        assert!(buckets > 0, "buckets must be > 0");
        self.buckets = buckets;
        self
    }

    /// Enables the secondary tier with `capacity` entries per shard.
    #[must_use]
    pub fn with_lru2_capacity(mut self, capacity: usize) -> Self {
        self.lru2_capacity = capacity;
        self
    }

    /// Sets the default lifetime of entries.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enables or disables the background sweeper.
    #[must_use]
    pub fn with_auto_cleaner(mut self, enabled: bool) -> Self {
        self.auto_cleaner = enabled;
        self
    }

    /// Starts the sweeper lazily (`true`) or at construction (`false`).
    #[must_use]
    pub fn with_lazy_cleaner(mut self, lazy: bool) -> Self {
        self.lazy_cleaner = lazy;
        self
    }

    /// Sets the idle period after which the sweeper stops itself.
    #[must_use]
    pub fn with_idle_after(mut self, idle_after: Duration) -> Self {
        self.idle_after = idle_after;
        self
    }

    /// Overrides the sweeper tick.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Releases key storage of deleted slots immediately.
    #[must_use]
    pub fn with_shrink_on_delete(mut self, shrink: bool) -> Self {
        self.shrink_on_delete = shrink;
        self
    }

    /// Effective shard count: `buckets` rounded up to a power of two.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.max(1).next_power_of_two()
    }

    /// Effective sweeper tick; zero disables the sweeper.
    #[inline]
    pub fn effective_sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.default_ttl)
    }
}

impl Default for FastCacheConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(Self::DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            buckets: Self::DEFAULT_BUCKETS,
            lru2_capacity: 0,
            default_ttl: Duration::ZERO,
            auto_cleaner: true,
            lazy_cleaner: true,
            idle_after: Self::DEFAULT_IDLE_AFTER,
            sweep_interval: None,
            shrink_on_delete: false,
        }
    }
}

impl fmt::Debug for FastCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastCacheConfig")
            .field("capacity", &self.capacity)
            .field("buckets", &self.bucket_count())
            .field("lru2_capacity", &self.lru2_capacity)
            .field("default_ttl", &self.default_ttl)
            .field("auto_cleaner", &self.auto_cleaner)
            .field("lazy_cleaner", &self.lazy_cleaner)
            .field("idle_after", &self.idle_after)
            .field("sweep_interval", &self.sweep_interval)
            .field("shrink_on_delete", &self.shrink_on_delete)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_config_defaults() {
        let config = FastCacheConfig::default();
        assert_eq!(config.capacity.get(), 1024);
        assert_eq!(config.bucket_count(), 4);
        assert_eq!(config.lru2_capacity, 0);
        assert_eq!(config.default_ttl, Duration::ZERO);
        assert!(config.auto_cleaner);
        assert!(config.lazy_cleaner);
        assert_eq!(config.idle_after, Duration::from_millis(30_000));
        assert_eq!(config.effective_sweep_interval(), Duration::ZERO);
    }

    #[test]
    fn test_fast_config_rounds_buckets() {
        let config = FastCacheConfig::default().with_buckets(5);
        assert_eq!(config.bucket_count(), 8);
        let config = FastCacheConfig::default().with_buckets(1);
        assert_eq!(config.bucket_count(), 1);
        let config = FastCacheConfig::default().with_buckets(16);
        assert_eq!(config.bucket_count(), 16);
    }

    #[test]
    fn test_fast_config_sweep_interval() {
        let config = FastCacheConfig::default().with_default_ttl(Duration::from_millis(100));
        assert_eq!(config.effective_sweep_interval(), Duration::from_millis(100));
        let config = config.with_sweep_interval(Duration::from_millis(10));
        assert_eq!(config.effective_sweep_interval(), Duration::from_millis(10));
    }

    #[test]
    #[should_panic(expected = "buckets must be > 0")]
    fn test_fast_config_zero_buckets_panics() {
        let _ = FastCacheConfig::default().with_buckets(0);
    }
}
