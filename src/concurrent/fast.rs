//! Sharded Two-Tier Cache
//!
//! [`FastCache`] partitions keys across a power-of-two number of shards, each
//! guarded by its own `parking_lot::Mutex`. A shard holds a primary
//! [`LruShard`] and, when `lru2_capacity > 0`, a secondary one.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           FastCache                              │
//! │                                                                  │
//! │  hash(key) & mask ──▶ shard                                      │
//! │                                                                  │
//! │  ┌──────────────────────┐        ┌──────────────────────┐        │
//! │  │ Shard 0  (Mutex)     │  ...   │ Shard N-1  (Mutex)   │        │
//! │  │  primary   LruShard  │        │  primary   LruShard  │        │
//! │  │     │ hit: move      │        │                      │        │
//! │  │     ▼                │        │                      │        │
//! │  │  secondary LruShard  │        │  secondary LruShard  │        │
//! │  └──────────────────────┘        └──────────────────────┘        │
//! │                                                                  │
//! │  Sweeper thread: one shard per tick, stops when empty and idle   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tiers
//!
//! New writes land in the primary tier. With a secondary tier configured, the
//! first hit in the primary tier moves the entry to the secondary tier, so
//! keys read at least twice live in the larger, longer-lived tier while
//! one-hit wonders churn through the primary.
//!
//! ## Expiry
//!
//! Entries past their deadline are tombstoned lazily by the lookup that finds
//! them and actively by the background sweeper.
//!
//! ## Locking
//!
//! A shard lock is never held across user code: the event callback and the
//! read-through producer always run after the lock is released. `for_each`
//! is the exception: the visitor runs under the lock of the shard it walks.
//!
//! # Example
//!
//! ```
//! use tiercache::{FastCache, Ttl, Value};
//! use tiercache::config::FastCacheConfig;
//! use std::time::Duration;
//!
//! let cache = FastCache::init(FastCacheConfig::default(), None);
//! cache.set(b"user:1", Value::any(String::from("alice")));
//! cache.set_bytes_with_ttl(b"session", b"token".to_vec(), Ttl::After(Duration::from_secs(60)));
//!
//! let user = cache.get(b"user:1").unwrap();
//! assert_eq!(user.downcast_ref::<String>().map(String::as_str), Some("alice"));
//! assert_eq!(cache.get_bytes(b"session").as_deref(), Some(&b"token"[..]));
//! ```

use crate::clock::{duration_ms, now_ms};
use crate::concurrent::loader::CoalescedLoader;
use crate::concurrent::sweeper::{Sweepable, Sweeper};
use crate::config::FastCacheConfig;
use crate::entry::{Value, ValueHandle};
use crate::error::{CacheError, Result};
use crate::lru::{Lookup, LruShard, PutOutcome, Walk};
use crate::metrics::{CacheMetrics, FastCacheMetrics};
use core::fmt;
use core::hash::BuildHasher;
use core::num::NonZeroUsize;
use hashbrown::DefaultHashBuilder;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lifetime requested for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the cache's `default_ttl`.
    #[default]
    Default,
    /// Never expire, whatever the default is.
    Never,
    /// Expire after this long. A zero duration means [`Ttl::Default`].
    After(Duration),
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Ttl::Default
        } else {
            Ttl::After(d)
        }
    }
}

/// Operation reported to the event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A lookup; the handle is null on a miss.
    Get,
    /// A write.
    Set,
    /// A delete; the handle is null if the key was absent.
    Delete,
}

/// Observer invoked after every get, set and delete.
///
/// The handle identifies the value for logging only. The callback must not
/// call back into the cache that invoked it with a write.
pub type EventCallback = Arc<dyn Fn(EventKind, &[u8], ValueHandle) + Send + Sync>;

/// What a read-through producer returns.
#[derive(Debug, Clone)]
pub enum Produced {
    /// Store the value and return it.
    Cache(Value),
    /// Return the value without storing it.
    NoCache(Value),
}

struct Shard {
    primary: LruShard,
    secondary: Option<LruShard>,
    metrics: FastCacheMetrics,
}

impl Shard {
    fn new(config: &FastCacheConfig) -> Self {
        let shrink = config.shrink_on_delete;
        Shard {
            primary: LruShard::with_options(config.capacity, shrink),
            secondary: NonZeroUsize::new(config.lru2_capacity)
                .map(|cap| LruShard::with_options(cap, shrink)),
            metrics: FastCacheMetrics::default(),
        }
    }

    fn put(&mut self, key: &[u8], value: Value, expire_at: u64) {
        // A key lives in at most one tier.
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.delete(key);
        }
        let outcome = self.primary.put(key, value, expire_at);
        self.record_put(outcome);
    }

    fn record_put(&mut self, outcome: PutOutcome) {
        match outcome {
            PutOutcome::Inserted => self.metrics.core.record_insertion(),
            PutOutcome::Updated => self.metrics.record_update(),
            PutOutcome::Evicted(_) => {
                self.metrics.core.record_insertion();
                self.metrics.core.record_eviction();
            }
        }
    }

    fn get(&mut self, key: &[u8], now: u64) -> Option<Value> {
        let found = self.probe(key, now);
        match found {
            Some(_) => self.metrics.core.record_hit(),
            None => self.metrics.core.record_miss(),
        }
        found
    }

    fn probe(&mut self, key: &[u8], now: u64) -> Option<Value> {
        match self.primary.lookup(key, now) {
            Lookup::Hit(slot) => {
                let Some(secondary) = self.secondary.as_mut() else {
                    return self.primary.node(slot).value().cloned();
                };
                let removed = self.primary.delete(key)?;
                let outcome = secondary.put(key, removed.value.clone(), removed.expire_at);
                if let PutOutcome::Evicted(_) = outcome {
                    self.metrics.core.record_eviction();
                }
                self.metrics.record_promotion();
                return Some(removed.value);
            }
            Lookup::Expired => self.metrics.core.record_expirations(1),
            Lookup::Miss => {}
        }

        let secondary = self.secondary.as_mut()?;
        match secondary.lookup(key, now) {
            Lookup::Hit(slot) => secondary.node(slot).value().cloned(),
            Lookup::Expired => {
                self.metrics.core.record_expirations(1);
                None
            }
            Lookup::Miss => None,
        }
    }

    fn delete(&mut self, key: &[u8]) -> Option<Value> {
        let first = self.primary.delete(key);
        let second = self.secondary.as_mut().and_then(|s| s.delete(key));
        let removed = match (first, second) {
            (Some(a), Some(b)) => {
                // The later deadline wins; 0 (never) is the latest of all.
                if b.expire_at == 0 || (a.expire_at != 0 && b.expire_at > a.expire_at) {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (a, b) => a.or(b),
        };
        if removed.is_some() {
            self.metrics.core.record_deletion();
        }
        removed.map(|r| r.value)
    }

    fn sweep(&mut self, now: u64) -> usize {
        let mut expired = self.primary.sweep_expired(now);
        if let Some(secondary) = self.secondary.as_mut() {
            expired += secondary.sweep_expired(now);
        }
        self.metrics.core.record_expirations(expired as u64);
        expired
    }

    fn len(&self) -> usize {
        self.primary.len() + self.secondary.as_ref().map_or(0, LruShard::len)
    }

    fn clear(&mut self) {
        self.primary.clear();
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.clear();
        }
    }
}

/// State shared with the sweeper thread.
struct Inner {
    shards: Box<[Mutex<Shard>]>,
    mask: usize,
    hash_builder: DefaultHashBuilder,
    idle_after_ms: u64,
    last_activity: AtomicU64,
}

impl Inner {
    #[inline]
    fn shard(&self, key: &[u8]) -> &Mutex<Shard> {
        let idx = (self.hash_builder.hash_one(key) as usize) & self.mask;
        &self.shards[idx]
    }
}

impl Sweepable for Inner {
    fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn sweep_shard(&self, idx: usize, now: u64) -> usize {
        self.shards[idx].lock().sweep(now)
    }

    fn is_idle(&self, now: u64) -> bool {
        let last = self.last_activity.load(Ordering::SeqCst);
        if now.saturating_sub(last) < self.idle_after_ms {
            return false;
        }
        self.shards.iter().all(|shard| shard.lock().len() == 0)
    }
}

/// A thread-safe, bounded, TTL-aware key-value cache.
///
/// Keys are byte strings and values are [`Value`]s. See the
/// [module documentation](self) for the shard layout.
///
/// # Thread Safety
///
/// `FastCache` is `Send + Sync`; share it with an `Arc`. Dropping it closes it.
pub struct FastCache {
    inner: Arc<Inner>,
    on_event: Option<EventCallback>,
    loader: CoalescedLoader<Vec<u8>, Value>,
    sweeper: Sweeper,
    closed: AtomicBool,
    config: FastCacheConfig,
}

impl FastCache {
    /// Creates a cache from `config` with an optional event callback.
    ///
    /// With `auto_cleaner` on and `lazy_cleaner` off, the sweeper starts
    /// right away; otherwise it starts on the first write.
    pub fn init(config: FastCacheConfig, on_event: Option<EventCallback>) -> Self {
        let bucket_count = config.bucket_count();
        let shards: Vec<Mutex<Shard>> = (0..bucket_count)
            .map(|_| Mutex::new(Shard::new(&config)))
            .collect();

        let inner = Arc::new(Inner {
            shards: shards.into_boxed_slice(),
            mask: bucket_count - 1,
            hash_builder: DefaultHashBuilder::default(),
            idle_after_ms: duration_ms(config.idle_after),
            last_activity: AtomicU64::new(now_ms()),
        });

        let interval = if config.auto_cleaner {
            config.effective_sweep_interval()
        } else {
            Duration::ZERO
        };
        let cache = FastCache {
            inner,
            on_event,
            loader: CoalescedLoader::new(),
            sweeper: Sweeper::new(interval),
            closed: AtomicBool::new(false),
            config,
        };
        if !config.lazy_cleaner {
            cache.sweeper.ensure_running(&cache.inner);
        }
        cache
    }

    /// Creates a cache with `capacity` entries per shard and default options.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::init(FastCacheConfig::new(capacity), None)
    }

    /// Stores `value` under `key` with the default lifetime.
    #[inline]
    pub fn set(&self, key: &[u8], value: Value) {
        self.set_with_ttl(key, value, Ttl::Default);
    }

    /// Stores `value` under `key` with the given lifetime.
    pub fn set_with_ttl(&self, key: &[u8], value: Value, ttl: impl Into<Ttl>) {
        if self.is_closed() {
            debug!("write ignored, cache is closed");
            return;
        }
        let now = now_ms();
        let expire_at = self.expire_at(ttl.into(), now);
        let handle = value.handle();
        self.inner.shard(key).lock().put(key, value, expire_at);
        self.mark_active(now);
        self.emit(EventKind::Set, key, handle);
    }

    /// Stores a byte buffer under `key` with the default lifetime.
    #[inline]
    pub fn set_bytes(&self, key: &[u8], value: impl Into<Arc<[u8]>>) {
        self.set_with_ttl(key, Value::bytes(value), Ttl::Default);
    }

    /// Stores a byte buffer under `key` with the given lifetime.
    #[inline]
    pub fn set_bytes_with_ttl(&self, key: &[u8], value: impl Into<Arc<[u8]>>, ttl: impl Into<Ttl>) {
        self.set_with_ttl(key, Value::bytes(value), ttl);
    }

    /// Returns the live value for `key`.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        let found = self.get_quiet(key);
        let handle = found.as_ref().map_or(ValueHandle::NULL, Value::handle);
        self.emit(EventKind::Get, key, handle);
        found
    }

    /// Returns the value for `key` if it is a byte buffer.
    pub fn get_bytes(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        match self.get(key)? {
            Value::Bytes(bytes) => Some(bytes),
            Value::Any(_) => None,
        }
    }

    fn get_quiet(&self, key: &[u8]) -> Option<Value> {
        if self.is_closed() {
            return None;
        }
        self.inner.shard(key).lock().get(key, now_ms())
    }

    /// Removes `key` from both tiers and returns its value. Removing an
    /// absent key is a no-op.
    pub fn delete(&self, key: &[u8]) -> Option<Value> {
        if self.is_closed() {
            return None;
        }
        let removed = self.inner.shard(key).lock().delete(key);
        let handle = removed.as_ref().map_or(ValueHandle::NULL, Value::handle);
        self.emit(EventKind::Delete, key, handle);
        removed
    }

    /// Visits live entries shard by shard (primary tier, then secondary)
    /// until the visitor returns `false`.
    ///
    /// Each shard is locked while it is walked; the visitor must not call
    /// back into this cache.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&[u8], &Value) -> bool,
    {
        if self.is_closed() {
            return;
        }
        let now = now_ms();
        let mut visit = |key: &[u8], value: &Value, _: u64| Walk::from(visitor(key, value));
        for shard in self.inner.shards.iter() {
            let shard = shard.lock();
            if shard.primary.for_each(now, &mut visit) == Walk::Stop {
                return;
            }
            if let Some(secondary) = shard.secondary.as_ref() {
                if secondary.for_each(now, &mut visit) == Walk::Stop {
                    return;
                }
            }
        }
    }

    /// Returns the cached value for `key`, or runs `produce` to fill it.
    ///
    /// At most one producer runs per key at a time across all callers; the
    /// others wait for it and share its outcome. The producer runs with no
    /// shard lock held. A [`Produced::Cache`] value is stored with `ttl`
    /// before any waiter is released.
    ///
    /// # Errors
    ///
    /// [`CacheError::Closed`] after [`close`](Self::close), and
    /// [`CacheError::ProducerFailed`] when the producer errs or panics.
    pub fn provide_get<F, E>(&self, key: &[u8], ttl: impl Into<Ttl>, produce: F) -> Result<Value>
    where
        F: FnOnce() -> core::result::Result<Produced, E>,
        E: fmt::Display,
    {
        if self.is_closed() {
            return Err(CacheError::Closed);
        }
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let ttl = ttl.into();
        self.loader.load(key, || {
            // Another flight may have filled the key since our miss.
            if let Some(value) = self.get_quiet(key) {
                return Ok(value);
            }
            match produce() {
                Ok(Produced::Cache(value)) => {
                    self.set_with_ttl(key, value.clone(), ttl);
                    Ok(value)
                }
                Ok(Produced::NoCache(value)) => Ok(value),
                Err(err) => Err(CacheError::ProducerFailed(err.to_string())),
            }
        })
    }

    /// Number of stored entries across shards and tiers, counting expired
    /// entries the sweeper has not reached yet.
    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(|s| s.lock().len()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Effective shard count.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.inner.shards.len()
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &FastCacheConfig {
        &self.config
    }

    /// Returns `true` while the background sweeper thread is alive.
    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Returns `true` once [`close`](Self::close) was called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drops every entry. Metrics are kept.
    pub fn clear(&self) {
        for shard in self.inner.shards.iter() {
            shard.lock().clear();
        }
    }

    /// Stops the sweeper, waits for it to exit and drops every entry.
    /// Later reads miss and later writes are ignored.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sweeper.shutdown();
        self.clear();
        debug!("cache closed");
    }

    /// Per-shard counters summed over every shard.
    pub fn stats(&self) -> FastCacheMetrics {
        let mut total = FastCacheMetrics::default();
        for shard in self.inner.shards.iter() {
            total.merge(&shard.lock().metrics);
        }
        total
    }

    fn expire_at(&self, ttl: Ttl, now: u64) -> u64 {
        let ms = match ttl {
            Ttl::Never => return 0,
            Ttl::Default => duration_ms(self.config.default_ttl),
            Ttl::After(d) if d.is_zero() => duration_ms(self.config.default_ttl),
            Ttl::After(d) => duration_ms(d).max(1),
        };
        if ms == 0 {
            0
        } else {
            now.saturating_add(ms)
        }
    }

    fn mark_active(&self, now: u64) {
        self.inner.last_activity.store(now, Ordering::SeqCst);
        self.sweeper.ensure_running(&self.inner);
    }

    fn emit(&self, kind: EventKind, key: &[u8], handle: ValueHandle) {
        let Some(callback) = self.on_event.as_ref() else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| callback(kind, key, handle))).is_err() {
            warn!("event callback panicked on {kind:?}");
        }
    }
}

impl CacheMetrics for FastCache {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.stats().to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "FastCache"
    }
}

impl Drop for FastCache {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for FastCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastCache")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .field("sweeper", &self.sweeper)
            .finish()
    }
}
