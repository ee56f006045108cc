//! Configuration for the TTL table.

use core::fmt;
use std::time::Duration;

/// Configuration for a [`TableCache`](crate::TableCache).
///
/// # Fields
///
/// - `max_sliding_lifespan`: upper bound for the lifespan of sliding entries.
///   Every sweep that finds a sliding entry accessed and not yet expired
///   doubles its lifespan; `None` lets it grow without bound. For entries
///   that expire exactly `lifespan` after their last access, set the cap to
///   that lifespan.
/// - `min_sweep_interval`: floor applied when re-arming the expiration timer,
///   so entries expiring at the same instant do not spin the worker. It is
///   also the delay before an expired entry whose removal was vetoed is
///   offered to the delete hooks again.
///
/// # Examples
///
/// ```
/// use tiercache::config::TableCacheConfig;
/// use std::time::Duration;
///
/// let config = TableCacheConfig::default()
///     .with_max_sliding_lifespan(Duration::from_secs(60));
/// assert_eq!(config.max_sliding_lifespan, Some(Duration::from_secs(60)));
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TableCacheConfig {
    /// Cap for grow-on-use lifespans, `None` for unbounded. Equal to the
    /// item lifespan, sliding items expire that long after their last access.
    pub max_sliding_lifespan: Option<Duration>,
    /// Minimum delay between two timer-driven sweeps.
    pub min_sweep_interval: Duration,
}

impl TableCacheConfig {
    /// Caps the lifespan of sliding entries.
    #[must_use]
    pub fn with_max_sliding_lifespan(mut self, cap: Duration) -> Self {
        self.max_sliding_lifespan = Some(cap);
        self
    }

    /// Sets the minimum delay between timer-driven sweeps.
    #[must_use]
    pub fn with_min_sweep_interval(mut self, interval: Duration) -> Self {
        self.min_sweep_interval = interval;
        self
    }

    /// Doubles `lifespan`, saturating and honoring the configured cap.
    pub(crate) fn grow_sliding(&self, lifespan: Duration) -> Duration {
        let grown = lifespan.saturating_mul(2);
        match self.max_sliding_lifespan {
            Some(cap) => grown.min(cap.max(lifespan)),
            None => grown,
        }
    }
}

impl Default for TableCacheConfig {
    fn default() -> Self {
        Self {
            max_sliding_lifespan: None,
            min_sweep_interval: Duration::from_millis(1),
        }
    }
}

impl fmt::Debug for TableCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableCacheConfig")
            .field("max_sliding_lifespan", &self.max_sliding_lifespan)
            .field("min_sweep_interval", &self.min_sweep_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_sliding_unbounded() {
        let config = TableCacheConfig::default();
        assert_eq!(
            config.grow_sliding(Duration::from_millis(200)),
            Duration::from_millis(400)
        );
        assert_eq!(config.grow_sliding(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_grow_sliding_capped() {
        let config = TableCacheConfig::default().with_max_sliding_lifespan(Duration::from_millis(500));
        assert_eq!(
            config.grow_sliding(Duration::from_millis(200)),
            Duration::from_millis(400)
        );
        assert_eq!(
            config.grow_sliding(Duration::from_millis(400)),
            Duration::from_millis(500)
        );
        // A lifespan already above the cap is never shrunk.
        assert_eq!(
            config.grow_sliding(Duration::from_millis(800)),
            Duration::from_millis(800)
        );
    }
}
