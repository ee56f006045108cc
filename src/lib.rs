#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Engine Selection Guide
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                     Which engine should I use?                        │
//! ├───────────────────────────────────────────────────────────────────────┤
//! │                                                                       │
//! │  Bounded memory, hot path, byte keys?  ──Yes──▶  FastCache            │
//! │            │                                       │                  │
//! │           No                          Expensive misses?               │
//! │            │                                       │                  │
//! │            ▼                                  Yes  ▼                  │
//! │  Per-entry hooks, sliding lifetimes,        FastCache::provide_get    │
//! │  access statistics?  ──Yes──▶  TableCache                             │
//! │                                                                       │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FastCache`] | Sharded two-tier LRU with millisecond TTL and a self-stopping sweeper |
//! | [`CoalescedLoader`] | At most one in-flight producer per key |
//! | [`TableCache`] | Unbounded TTL table with sliding lifetimes and delete veto |
//! | [`LruShard`] | The single-threaded fixed-capacity LRU behind every shard |
//!
//! ## Performance Characteristics
//!
//! | Engine | Get | Set | Delete | Allocation on hit |
//! |--------|-----|-----|--------|-------------------|
//! | FastCache  | O(1) | O(1) | O(1) | none |
//! | TableCache | O(1) | O(1) | O(1) | none |
//!
//! ## Code Examples
//!
//! ### FastCache
//!
//! ```rust
//! use tiercache::{FastCache, Value};
//! use tiercache::config::FastCacheConfig;
//! use core::num::NonZeroUsize;
//!
//! let config = FastCacheConfig::new(NonZeroUsize::new(2).unwrap()).with_buckets(1);
//! let cache = FastCache::init(config, None);
//! cache.set(b"a", Value::from("1"));
//! cache.set(b"b", Value::from("2"));
//! cache.get(b"a");                    // "a" becomes most recently used
//! cache.set(b"c", Value::from("3"));  // "b" evicted
//! assert!(cache.get(b"b").is_none());
//! ```
//!
//! ### Read-through
//!
//! ```rust
//! use tiercache::{FastCache, Produced, Ttl, Value};
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! let cache = FastCache::new(NonZeroUsize::new(128).unwrap());
//! let v = cache
//!     .provide_get(b"user:7", Ttl::After(Duration::from_secs(30)), || {
//!         Ok::<_, std::io::Error>(Produced::Cache(Value::from("carol")))
//!     })
//!     .unwrap();
//! assert_eq!(v.as_bytes(), Some(&b"carol"[..]));
//! assert!(cache.get(b"user:7").is_some());
//! ```
//!
//! ### TableCache
//!
//! ```rust
//! use tiercache::Value;
//! use std::time::Duration;
//!
//! let table = tiercache::open("crate-docs");
//! table.set_sliding("k", Value::from("v"), Duration::from_secs(5));
//! assert!(table.exists("k"));
//! assert_eq!(table.get_item("k").unwrap().access_count(), 1);
//! ```

/// Millisecond monotonic clock.
pub(crate) mod clock;

/// Value slots and LRU nodes.
///
/// Provides [`Value`], the opaque payload shared by both engines, and
/// [`Node`], one preallocated slot of a shard.
pub mod entry;

/// Doubly linked list encoded over an index array.
///
/// **Note**: This module is internal infrastructure. Use [`LruShard`] or the
/// engines instead.
pub(crate) mod list;

/// Cache configuration structures.
pub mod config;

/// Error type and result alias.
pub mod error;

/// Fixed-capacity LRU over preallocated slots.
///
/// The single-threaded engine behind every shard of [`FastCache`].
pub mod lru;

/// Cache metrics system.
///
/// Counters for both engines, reported through a common
/// [`CacheMetrics`](metrics::CacheMetrics) trait.
pub mod metrics;

/// Thread-safe sharded cache.
///
/// Provides [`FastCache`], its read-through [`CoalescedLoader`] and the
/// background sweeper.
pub mod concurrent;

/// TTL table and the process-wide table registry.
pub mod table;

pub use entry::{Node, Value, ValueHandle};
pub use error::{CacheError, Result};
pub use lru::{LruShard, PutOutcome, Removed, Walk};

pub use concurrent::{CoalescedLoader, EventCallback, EventKind, FastCache, Produced, Ttl};

pub use table::{
    contains, open, open_with_config, AddCallback, DeleteCallback, Key, LoadMissCallback,
    TableCache, TableItem,
};
