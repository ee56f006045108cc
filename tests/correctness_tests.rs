//! Correctness Tests for the Sharded Cache
//!
//! This module validates the fundamental behavior of `FastCache` and its shard
//! engine using small, single-shard caches so every eviction is predictable.
//!
//! ## Test Strategy
//! - One shard (`buckets = 1`) unless sharding itself is under test
//! - Small capacities (2-4 entries)
//! - Explicit checks for which key was evicted after each write
//! - TTL checks with generous margins around the deadline

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;
use tiercache::config::FastCacheConfig;
use tiercache::{FastCache, LruShard, PutOutcome, Ttl, Value, Walk};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Single-shard cache with `cap` entries and no TTL.
fn make_cache(cap: usize) -> FastCache {
    let config = FastCacheConfig::new(NonZeroUsize::new(cap).unwrap()).with_buckets(1);
    FastCache::init(config, None)
}

fn num(n: u32) -> Value {
    Value::any(n)
}

fn get_num(cache: &FastCache, key: &[u8]) -> Option<u32> {
    cache.get(key).and_then(|v| v.downcast_ref::<u32>().copied())
}

// ============================================================================
// BASIC SCENARIOS
// ============================================================================

#[test]
fn test_basic_get_set() {
    let cache = make_cache(4);
    cache.set(b"a", num(1));
    cache.set(b"b", num(2));
    assert_eq!(get_num(&cache, b"a"), Some(1));
    assert_eq!(get_num(&cache, b"b"), Some(2));
    assert_eq!(get_num(&cache, b"c"), None);
}

#[test]
fn test_eviction_of_oldest() {
    let cache = make_cache(2);
    cache.set(b"a", num(1));
    cache.set(b"b", num(2));
    cache.set(b"c", num(3));
    assert_eq!(get_num(&cache, b"a"), None);
    assert_eq!(get_num(&cache, b"b"), Some(2));
    assert_eq!(get_num(&cache, b"c"), Some(3));
}

#[test]
fn test_get_refreshes_recency() {
    let cache = make_cache(2);
    cache.set(b"a", num(1));
    cache.set(b"b", num(2));
    cache.get(b"a");
    cache.set(b"c", num(3));
    assert_eq!(get_num(&cache, b"b"), None);
    assert_eq!(get_num(&cache, b"a"), Some(1));
    assert_eq!(get_num(&cache, b"c"), Some(3));
}

#[test]
fn test_ttl_expiry() {
    let config = FastCacheConfig::default().with_default_ttl(Duration::from_millis(100));
    let cache = FastCache::init(config, None);
    cache.set_bytes(b"k", b"v".to_vec());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(cache.get_bytes(b"k").as_deref(), Some(&b"v"[..]));
    thread::sleep(Duration::from_millis(80));
    assert!(cache.get(b"k").is_none());
}

#[test]
fn test_explicit_ttl_overrides_default() {
    let config = FastCacheConfig::default()
        .with_buckets(1)
        .with_default_ttl(Duration::from_millis(40));
    let cache = FastCache::init(config, None);
    cache.set_with_ttl(b"never", num(1), Ttl::Never);
    cache.set_with_ttl(b"long", num(2), Duration::from_secs(60));
    cache.set(b"default", num(3));
    thread::sleep(Duration::from_millis(80));
    assert_eq!(get_num(&cache, b"never"), Some(1));
    assert_eq!(get_num(&cache, b"long"), Some(2));
    assert_eq!(get_num(&cache, b"default"), None);
}

#[test]
fn test_overwrite_returns_latest() {
    let cache = make_cache(4);
    cache.set(b"k", num(1));
    cache.set(b"k", num(2));
    assert_eq!(get_num(&cache, b"k"), Some(2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_delete_is_silent_on_missing_key() {
    let cache = make_cache(4);
    assert!(cache.delete(b"missing").is_none());
    cache.set(b"k", num(1));
    assert_eq!(
        cache.delete(b"k").and_then(|v| v.downcast_ref::<u32>().copied()),
        Some(1)
    );
    assert!(cache.get(b"k").is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_deleted_slot_is_reused_before_eviction() {
    let cache = make_cache(3);
    cache.set(b"a", num(1));
    cache.set(b"b", num(2));
    cache.set(b"c", num(3));
    cache.delete(b"b");
    cache.set(b"d", num(4));
    assert_eq!(get_num(&cache, b"a"), Some(1));
    assert_eq!(get_num(&cache, b"c"), Some(3));
    assert_eq!(get_num(&cache, b"d"), Some(4));
}

// ============================================================================
// LRU PROPERTIES
// ============================================================================

#[test]
fn test_touched_keys_survive_eviction() {
    let cap = 8;
    let cache = make_cache(cap);
    for i in 0..cap as u32 {
        cache.set(&i.to_be_bytes(), num(i));
    }
    let touched = [0u32, 2, 4, 6, 7];
    for k in touched {
        assert!(cache.get(&k.to_be_bytes()).is_some());
    }
    cache.set(b"new", num(99));
    for k in touched {
        assert_eq!(get_num(&cache, &k.to_be_bytes()), Some(k), "key {k} evicted");
    }
    assert_eq!(get_num(&cache, &1u32.to_be_bytes()), None);
}

#[test]
fn test_capacity_bound_per_shard() {
    let config = FastCacheConfig::new(NonZeroUsize::new(8).unwrap()).with_buckets(4);
    let cache = FastCache::init(config, None);
    for i in 0u32..10_000 {
        cache.set(&i.to_le_bytes(), num(i));
        assert!(cache.len() <= 8 * 4);
    }
}

#[test]
fn test_for_each_visits_and_stops() {
    let cache = FastCache::init(FastCacheConfig::default(), None);
    for i in 0u32..20 {
        cache.set(&i.to_le_bytes(), num(i));
    }
    let mut all = 0;
    cache.for_each(|_, _| {
        all += 1;
        true
    });
    assert_eq!(all, 20);

    let mut some = 0;
    cache.for_each(|_, _| {
        some += 1;
        some < 5
    });
    assert_eq!(some, 5);
}

#[test]
fn test_for_each_skips_expired() {
    let cache = FastCache::init(FastCacheConfig::default().with_auto_cleaner(false), None);
    cache.set_with_ttl(b"short", num(1), Duration::from_millis(10));
    cache.set(b"keep", num(2));
    thread::sleep(Duration::from_millis(30));
    let mut keys = Vec::new();
    cache.for_each(|k, _| {
        keys.push(k.to_vec());
        true
    });
    assert_eq!(keys, vec![b"keep".to_vec()]);
}

// ============================================================================
// TWO-TIER SHARDS
// ============================================================================

#[test]
fn test_second_hit_lives_in_secondary_tier() {
    let config = FastCacheConfig::new(NonZeroUsize::new(2).unwrap())
        .with_buckets(1)
        .with_lru2_capacity(8);
    let cache = FastCache::init(config, None);
    cache.set(b"hot", num(1));
    cache.get(b"hot");

    // Flood the primary tier; the promoted key is out of its reach.
    for i in 0u32..100 {
        cache.set(&i.to_le_bytes(), num(i));
    }
    assert_eq!(get_num(&cache, b"hot"), Some(1));
    assert!(cache.stats().promotions >= 1);
}

#[test]
fn test_expired_entry_in_secondary_tier() {
    let config = FastCacheConfig::new(NonZeroUsize::new(2).unwrap())
        .with_buckets(1)
        .with_lru2_capacity(2)
        .with_auto_cleaner(false);
    let cache = FastCache::init(config, None);
    cache.set_with_ttl(b"k", num(1), Duration::from_millis(20));
    assert!(cache.get(b"k").is_some());
    thread::sleep(Duration::from_millis(40));
    assert!(cache.get(b"k").is_none());
    assert_eq!(cache.stats().core.expirations, 1);
}

// ============================================================================
// SHARD ENGINE
// ============================================================================

#[test]
fn test_shard_put_outcomes() {
    let mut shard = LruShard::new(NonZeroUsize::new(2).unwrap());
    assert_eq!(shard.put(b"a", num(1), 0), PutOutcome::Inserted);
    assert_eq!(shard.put(b"a", num(2), 0), PutOutcome::Updated);
    assert_eq!(shard.put(b"b", num(3), 0), PutOutcome::Inserted);
    assert_eq!(
        shard.put(b"c", num(4), 0),
        PutOutcome::Evicted(b"a".to_vec().into_boxed_slice())
    );
}

#[test]
fn test_shard_expiry_boundary() {
    let mut shard = LruShard::new(NonZeroUsize::new(4).unwrap());
    shard.put(b"k", num(1), 1_000);
    assert!(shard.get(b"k", 999).is_some());
    assert!(shard.get(b"k", 1_000).is_some());
    assert!(shard.get(b"k", 1_001).is_none());
}

#[test]
fn test_sweep_is_idempotent() {
    let mut shard = LruShard::new(NonZeroUsize::new(8).unwrap());
    for i in 0u8..8 {
        let expire_at = if i % 2 == 0 { 10 } else { 0 };
        shard.put(&[i], num(i.into()), expire_at);
    }
    let snapshot = |shard: &LruShard| {
        let mut keys = Vec::new();
        shard.for_each(0, |k, _, _| {
            keys.push(k.to_vec());
            Walk::Continue
        });
        keys
    };

    assert_eq!(shard.sweep_expired(20), 4);
    let once = snapshot(&shard);
    assert_eq!(shard.sweep_expired(20), 0);
    assert_eq!(snapshot(&shard), once);
    assert_eq!(shard.len(), 4);
}
