//! Concurrent Sharded Cache
//!
//! This module provides [`FastCache`], the thread-safe sharded LRU, together
//! with its two companions: the per-key [`CoalescedLoader`] behind
//! [`FastCache::provide_get`] and the background sweeper that expires
//! entries.
//!
//! # Architecture
//!
//! - The key space is partitioned across a power-of-two number of shards by
//!   `hash(key) & mask`.
//! - Each shard is protected by its own `parking_lot::Mutex`.
//! - An operation locks exactly one shard; no code path ever holds two shard
//!   locks at once.
//!
//! ## Why Mutex Instead of RwLock?
//!
//! Every `get()` on an LRU mutates the recency list, and on a two-tier shard
//! a primary hit also moves the entry to the secondary tier. A read lock would
//! never be enough, so `Mutex` is used and concurrency comes from sharding.
//!
//! # Contents
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FastCache`] | Sharded two-tier LRU with TTL and a self-stopping sweeper |
//! | [`CoalescedLoader`] | At most one in-flight producer per key |
//!
//! # Example
//!
//! ```
//! use tiercache::{FastCache, Produced, Ttl, Value};
//! use tiercache::config::FastCacheConfig;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let cache = Arc::new(FastCache::init(FastCacheConfig::default(), None));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let cache = Arc::clone(&cache);
//!         thread::spawn(move || {
//!             for i in 0..100u32 {
//!                 let key = format!("key_{t}_{i}");
//!                 cache.set(key.as_bytes(), Value::any(i));
//!                 assert!(cache.get(key.as_bytes()).is_some());
//!             }
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! let v = cache
//!     .provide_get(b"config", Ttl::Default, || {
//!         Ok::<_, std::io::Error>(Produced::Cache(Value::from("loaded")))
//!     })
//!     .unwrap();
//! assert_eq!(v.as_bytes(), Some(&b"loaded"[..]));
//! ```

mod fast;
mod loader;
pub(crate) mod sweeper;

pub use self::fast::{EventCallback, EventKind, FastCache, Produced, Ttl};
pub use self::loader::CoalescedLoader;
