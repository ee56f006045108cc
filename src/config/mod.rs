//! Cache Configuration Module
//!
//! Configuration structures for both engines. Each struct has public fields
//! for direct instantiation plus `with_*` builder methods, and a `Default`
//! matching the documented defaults.
//!
//! | Config | Engine |
//! |--------|--------|
//! | [`FastCacheConfig`] | [`FastCache`](crate::FastCache) |
//! | [`TableCacheConfig`] | [`TableCache`](crate::TableCache) |
//!
//! # Examples
//!
//! ```
//! use tiercache::config::FastCacheConfig;
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! let config = FastCacheConfig {
//!     capacity: NonZeroUsize::new(4).unwrap(),
//!     buckets: 1,
//!     default_ttl: Duration::from_millis(100),
//!     ..FastCacheConfig::default()
//! };
//! assert_eq!(config.bucket_count(), 1);
//! ```

pub mod fast;
pub mod table;

pub use fast::FastCacheConfig;
pub use table::TableCacheConfig;
