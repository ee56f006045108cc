//! Error types returned by the cache engines.
//!
//! The sharded cache is infallible for plain `get`/`set`/`delete`; only the
//! read-through path can fail. The TTL table reports missing keys as errors to
//! keep the "lookup failed" case explicit for callers.

use thiserror::Error;

/// Errors surfaced by [`FastCache`](crate::FastCache) and
/// [`TableCache`](crate::TableCache).
///
/// `Clone` so that one coalesced outcome can be delivered to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The key is not in the table.
    #[error("key not found in cache")]
    KeyNotFound,

    /// The key is not in the table and no load-miss callback is installed.
    #[error("key not found and no loader configured")]
    KeyNotFoundAndNoLoader,

    /// A read-through producer failed or panicked.
    #[error("producer failed: {0}")]
    ProducerFailed(String),

    /// The cache was closed.
    #[error("cache is closed")]
    Closed,
}

/// Shorthand for results carrying a [`CacheError`].
pub type Result<T> = core::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(CacheError::KeyNotFound.to_string(), "key not found in cache");
        assert_eq!(
            CacheError::ProducerFailed("timeout".into()).to_string(),
            "producer failed: timeout"
        );
        assert_eq!(CacheError::Closed.to_string(), "cache is closed");
    }

    #[test]
    fn test_clone_preserves_variant() {
        let err = CacheError::ProducerFailed("boom".into());
        assert_eq!(err.clone(), err);
        assert_ne!(CacheError::KeyNotFound, CacheError::KeyNotFoundAndNoLoader);
    }
}
