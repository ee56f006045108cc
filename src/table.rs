//! TTL Table
//!
//! [`TableCache`] is an unbounded map from [`Key`] to shared [`TableItem`]s
//! with per-entry lifetimes, driven by a single timer.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ TableCache "sessions"                                        │
//! │                                                              │
//! │  RwLock<HashMap<Key, Arc<TableItem>>>                        │
//! │     get/exists/count ─▶ read lock                            │
//! │     set/add/delete   ─▶ write lock                           │
//! │                                                              │
//! │  hooks: on_load_miss, on_add, on_delete (run unlocked)       │
//! │                                                              │
//! │  Timer thread: sleep until nearest deadline ─▶ sweep ─▶ re-arm│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifetimes
//!
//! - A zero lifespan never expires.
//! - A non-sliding item expires `lifespan` after it was created.
//! - A sliding item expires once it has not been accessed for `lifespan`.
//!   Each sweep that finds it still in use doubles its lifespan, up to
//!   [`TableCacheConfig::max_sliding_lifespan`] when one is set.
//!
//! ## Delete veto
//!
//! Every removal, by [`TableCache::delete`] or by the timer, asks the table
//! hook, then the item hook. Either may return `false` to keep the item,
//! which also refreshes its access time and so renews a sliding lifespan. A
//! vetoed absolute item stays expired and is asked again after
//! [`TableCacheConfig::min_sweep_interval`].
//!
//! # Example
//!
//! ```
//! use tiercache::{Key, TableCache, Value};
//! use tiercache::config::TableCacheConfig;
//! use std::time::Duration;
//!
//! let table = TableCache::new("sessions", TableCacheConfig::default());
//! table.set("alice", Value::from("token-a"), Duration::from_secs(60));
//! table.set_sliding("bob", Value::from("token-b"), Duration::from_secs(60));
//!
//! assert_eq!(table.get("alice").unwrap().as_bytes(), Some(&b"token-a"[..]));
//! assert_eq!(table.get_item("alice").unwrap().access_count(), 2);
//! assert_eq!(table.count(), 2);
//!
//! table.set_delete_callback(|item| *item.key() != Key::from("bob"));
//! assert!(table.delete("alice").is_ok());
//! assert!(table.delete("bob").is_ok());
//! assert!(!table.exists("alice"));
//! assert!(table.exists("bob"));
//! ```

mod item;
mod registry;
mod timer;

pub use self::item::{DeleteCallback, Key, TableItem};
pub use self::registry::{contains, open, open_with_config};

use self::item::Expiry;
use self::timer::{Expiring, Timer};
use crate::config::TableCacheConfig;
use crate::entry::Value;
use crate::error::{CacheError, Result};
use crate::metrics::{CacheMetrics, TableCacheMetrics};
use core::fmt;
use hashbrown::HashMap;
use log::{trace, warn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Hook producing an item for a missing key. Receives the key and the extra
/// arguments passed to [`TableCache::get_with_args`].
pub type LoadMissCallback = Arc<dyn Fn(&Key, &[Value]) -> Option<TableItem> + Send + Sync>;

/// Hook told about every item added to the table.
pub type AddCallback = Arc<dyn Fn(&Arc<TableItem>) + Send + Sync>;

struct TableInner {
    name: String,
    config: TableCacheConfig,
    items: RwLock<HashMap<Key, Arc<TableItem>>>,
    on_load_miss: RwLock<Option<LoadMissCallback>>,
    on_add: RwLock<Option<AddCallback>>,
    on_delete: RwLock<Option<DeleteCallback>>,
    metrics: TableCacheMetrics,
}

impl TableInner {
    /// Asks the table hook, then the item hook. A panicking hook allows.
    fn allow_delete(&self, item: &Arc<TableItem>) -> bool {
        let table_hook = self.on_delete.read().clone();
        if let Some(hook) = table_hook {
            if !self.ask(&hook, item) {
                return false;
            }
        }
        match item.delete_callback() {
            Some(hook) => self.ask(&hook, item),
            None => true,
        }
    }

    fn ask(&self, hook: &DeleteCallback, item: &Arc<TableItem>) -> bool {
        catch_unwind(AssertUnwindSafe(|| hook(item))).unwrap_or_else(|_| {
            warn!("delete callback panicked in table {}", self.name);
            true
        })
    }

    fn notify_added(&self, item: &Arc<TableItem>) {
        let hook = self.on_add.read().clone();
        if let Some(hook) = hook {
            if catch_unwind(AssertUnwindSafe(|| hook(item))).is_err() {
                warn!("add callback panicked in table {}", self.name);
            }
        }
    }
}

impl Expiring for TableInner {
    fn expire(&self, now: Instant) -> Option<Duration> {
        self.metrics.record_sweep();
        let mut next: Option<Duration> = None;
        let mut due = Vec::new();
        for item in self.items.read().values() {
            match item.sweep(now, &self.config) {
                Expiry::Never => {}
                Expiry::Expired => due.push(Arc::clone(item)),
                Expiry::Remaining(left) => next = earliest(next, left),
            }
        }

        let mut expired = Vec::with_capacity(due.len());
        for item in due {
            if self.allow_delete(&item) {
                expired.push(item);
                continue;
            }
            item.keep_alive(now);
            self.metrics.record_veto();
            match item.expiry(now) {
                Expiry::Never => {}
                Expiry::Expired => next = earliest(next, self.config.min_sweep_interval),
                Expiry::Remaining(left) => next = earliest(next, left),
            }
        }

        if !expired.is_empty() {
            let mut items = self.items.write();
            // An item may have been replaced or touched since the scan.
            expired.retain(|item| {
                let current = items
                    .get(item.key())
                    .is_some_and(|current| Arc::ptr_eq(current, item));
                if !current {
                    return false;
                }
                match item.expiry(now) {
                    Expiry::Expired => {
                        items.remove(item.key());
                        true
                    }
                    Expiry::Remaining(left) => {
                        next = earliest(next, left);
                        false
                    }
                    Expiry::Never => false,
                }
            });
        }

        self.metrics.record_expirations(expired.len() as u64);
        trace!(
            "table {} swept: {} expired, next in {:?}",
            self.name,
            expired.len(),
            next
        );
        next
    }
}

fn earliest(next: Option<Duration>, left: Duration) -> Option<Duration> {
    Some(next.map_or(left, |n| n.min(left)))
}

/// A named TTL table.
///
/// See the [module documentation](self) for the lifetime rules and the
/// delete veto.
pub struct TableCache {
    inner: Arc<TableInner>,
    timer: Timer,
}

impl TableCache {
    /// Creates a standalone table. Use [`open`] for the shared registry.
    pub fn new(name: impl Into<String>, config: TableCacheConfig) -> Self {
        TableCache {
            inner: Arc::new(TableInner {
                name: name.into(),
                config,
                items: RwLock::new(HashMap::new()),
                on_load_miss: RwLock::new(None),
                on_add: RwLock::new(None),
                on_delete: RwLock::new(None),
                metrics: TableCacheMetrics::default(),
            }),
            timer: Timer::new(config.min_sweep_interval),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &TableCacheConfig {
        &self.inner.config
    }

    /// Inserts or replaces `key` with a lifetime counted from creation.
    pub fn set(&self, key: impl Into<Key>, data: Value, lifespan: Duration) -> Arc<TableItem> {
        self.set_raw(TableItem::new(key, data, lifespan))
    }

    /// Inserts or replaces `key` with a lifetime renewed on access.
    pub fn set_sliding(
        &self,
        key: impl Into<Key>,
        data: Value,
        lifespan: Duration,
    ) -> Arc<TableItem> {
        self.set_raw(TableItem::new(key, data, lifespan).with_sliding(true))
    }

    /// Inserts or replaces a prebuilt item.
    pub fn set_raw(&self, item: TableItem) -> Arc<TableItem> {
        let item = Arc::new(item);
        self.inner
            .items
            .write()
            .insert(item.key().clone(), Arc::clone(&item));
        self.added(&item);
        item
    }

    /// Inserts `key` only if it is absent. Returns `false`, without firing
    /// the add hook, if it was already present.
    pub fn add(&self, key: impl Into<Key>, data: Value, lifespan: Duration) -> bool {
        self.add_raw(TableItem::new(key, data, lifespan))
    }

    /// [`add`](Self::add) with a sliding lifetime.
    pub fn add_sliding(&self, key: impl Into<Key>, data: Value, lifespan: Duration) -> bool {
        self.add_raw(TableItem::new(key, data, lifespan).with_sliding(true))
    }

    fn add_raw(&self, item: TableItem) -> bool {
        let item = Arc::new(item);
        {
            let mut items = self.inner.items.write();
            if items.contains_key(item.key()) {
                return false;
            }
            items.insert(item.key().clone(), Arc::clone(&item));
        }
        self.added(&item);
        true
    }

    fn added(&self, item: &Arc<TableItem>) {
        self.inner.metrics.record_addition();
        let lifespan = item.lifespan();
        if !lifespan.is_zero() {
            let deadline = Instant::now() + lifespan;
            self.timer.expedite(deadline, &self.inner);
        }
        self.inner.notify_added(item);
    }

    /// Returns the data stored under `key` and records an access.
    ///
    /// # Errors
    ///
    /// [`CacheError::KeyNotFound`] if the key is absent and the load-miss
    /// hook produced nothing, [`CacheError::KeyNotFoundAndNoLoader`] if the
    /// key is absent and no hook is installed.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
        self.get_with_args(key, &[])
    }

    /// Like [`get`](Self::get), passing `args` to the load-miss hook.
    pub fn get_with_args(&self, key: impl Into<Key>, args: &[Value]) -> Result<Value> {
        self.lookup(key.into(), args).map(|item| item.data().clone())
    }

    /// Like [`get`](Self::get), returning the whole item.
    pub fn get_item(&self, key: impl Into<Key>) -> Result<Arc<TableItem>> {
        self.lookup(key.into(), &[])
    }

    fn lookup(&self, key: Key, args: &[Value]) -> Result<Arc<TableItem>> {
        let metrics = &self.inner.metrics;
        metrics.record_request();
        let found = self.inner.items.read().get(&key).cloned();
        if let Some(item) = found {
            item.touch(Instant::now());
            metrics.record_hit();
            return Ok(item);
        }

        let loader = self.inner.on_load_miss.read().clone();
        let Some(loader) = loader else {
            return Err(CacheError::KeyNotFoundAndNoLoader);
        };
        let loaded = catch_unwind(AssertUnwindSafe(|| loader(&key, args))).unwrap_or_else(|_| {
            warn!("load-miss callback panicked in table {}", self.inner.name);
            None
        });
        match loaded {
            Some(item) => {
                metrics.record_load();
                Ok(self.set_raw(item))
            }
            None => Err(CacheError::KeyNotFound),
        }
    }

    /// Deletes `key` unless a delete hook vetoes it. Returns the item either
    /// way; a vetoed item stays in the table with a refreshed access time.
    ///
    /// # Errors
    ///
    /// [`CacheError::KeyNotFound`] if the key is absent.
    pub fn delete(&self, key: impl Into<Key>) -> Result<Arc<TableItem>> {
        let key = key.into();
        let item = self
            .inner
            .items
            .read()
            .get(&key)
            .cloned()
            .ok_or(CacheError::KeyNotFound)?;

        if !self.inner.allow_delete(&item) {
            item.keep_alive(Instant::now());
            self.inner.metrics.record_veto();
            return Ok(item);
        }

        let mut items = self.inner.items.write();
        if matches!(items.get(&key), Some(current) if Arc::ptr_eq(current, &item)) {
            items.remove(&key);
            drop(items);
            self.inner.metrics.record_deletion();
        }
        Ok(item)
    }

    /// Refreshes the access time of `key` without counting an access.
    ///
    /// # Errors
    ///
    /// [`CacheError::KeyNotFound`] if the key is absent.
    pub fn keep_alive(&self, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        let item = self.inner.items.read().get(&key).cloned();
        match item {
            Some(item) => {
                item.keep_alive(Instant::now());
                Ok(())
            }
            None => Err(CacheError::KeyNotFound),
        }
    }

    /// Returns `true` if `key` is present. Does not count as an access.
    pub fn exists(&self, key: impl Into<Key>) -> bool {
        self.inner.items.read().contains_key(&key.into())
    }

    pub fn count(&self) -> usize {
        self.inner.items.read().len()
    }

    /// Drops every item and disarms the timer. Delete hooks are not called.
    pub fn clear(&self) {
        self.inner.items.write().clear();
        self.timer.cancel();
    }

    /// Visits a snapshot of the items. The table is not locked while the
    /// visitor runs, so it may call back into the table.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Key, &Arc<TableItem>),
    {
        for item in self.snapshot() {
            visitor(item.key(), &item);
        }
    }

    /// Up to `n` items, most accessed first. Ties keep iteration order.
    pub fn most_accessed(&self, n: usize) -> Vec<Arc<TableItem>> {
        let mut ranked: Vec<(u64, Arc<TableItem>)> = self
            .snapshot()
            .into_iter()
            .map(|item| (item.access_count(), item))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().take(n).map(|(_, item)| item).collect()
    }

    fn snapshot(&self) -> Vec<Arc<TableItem>> {
        self.inner.items.read().values().cloned().collect()
    }

    /// When the timer will sweep next, `None` while disarmed.
    pub fn next_sweep(&self) -> Option<Instant> {
        self.timer.next_sweep()
    }

    pub fn set_load_miss_callback<F>(&self, callback: F)
    where
        F: Fn(&Key, &[Value]) -> Option<TableItem> + Send + Sync + 'static,
    {
        *self.inner.on_load_miss.write() = Some(Arc::new(callback));
    }

    pub fn set_add_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<TableItem>) + Send + Sync + 'static,
    {
        *self.inner.on_add.write() = Some(Arc::new(callback));
    }

    pub fn remove_add_callback(&self) {
        *self.inner.on_add.write() = None;
    }

    /// Installs the table-wide delete hook; returning `false` vetoes a
    /// [`delete`](Self::delete).
    pub fn set_delete_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<TableItem>) -> bool + Send + Sync + 'static,
    {
        *self.inner.on_delete.write() = Some(Arc::new(callback));
    }

    pub fn remove_delete_callback(&self) {
        *self.inner.on_delete.write() = None;
    }

    pub fn metrics(&self) -> &TableCacheMetrics {
        &self.inner.metrics
    }
}

impl CacheMetrics for TableCache {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.inner.metrics.metrics()
    }

    fn algorithm_name(&self) -> &'static str {
        self.inner.metrics.algorithm_name()
    }
}

impl Drop for TableCache {
    fn drop(&mut self) {
        self.timer.shutdown();
    }
}

impl fmt::Debug for TableCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableCache")
            .field("name", &self.inner.name)
            .field("count", &self.count())
            .field("config", &self.inner.config)
            .field("timer", &self.timer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn table() -> TableCache {
        TableCache::new("test", TableCacheConfig::default())
    }

    fn text(v: &Value) -> &str {
        core::str::from_utf8(v.as_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_set_get_counts_access() {
        let t = table();
        t.set("k", Value::from("v"), Duration::ZERO);
        assert_eq!(text(&t.get("k").unwrap()), "v");
        assert_eq!(text(&t.get("k").unwrap()), "v");
        let item = t.get_item("k").unwrap();
        assert_eq!(item.access_count(), 3);
        assert!(item.accessed_time() >= item.created_time());
        assert_eq!(item.remaining_life(), None);
    }

    #[test]
    fn test_missing_key_errors() {
        let t = table();
        assert_eq!(t.get("nope").unwrap_err(), CacheError::KeyNotFoundAndNoLoader);
        assert_eq!(t.delete("nope").unwrap_err(), CacheError::KeyNotFound);
        assert_eq!(t.keep_alive("nope").unwrap_err(), CacheError::KeyNotFound);

        t.set_load_miss_callback(|_, _| None);
        assert_eq!(t.get("nope").unwrap_err(), CacheError::KeyNotFound);
    }

    #[test]
    fn test_add_only_when_absent() {
        let t = table();
        let added = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&added);
        t.set_add_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(t.add("k", Value::from("1"), Duration::ZERO));
        assert!(!t.add("k", Value::from("2"), Duration::ZERO));
        assert_eq!(text(&t.get("k").unwrap()), "1");
        assert_eq!(added.load(Ordering::SeqCst), 1);

        t.remove_add_callback();
        t.set("j", Value::from("3"), Duration::ZERO);
        assert_eq!(added.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_loader_fills_table() {
        let t = table();
        t.set_load_miss_callback(|key, args| {
            let data = args.first().cloned().unwrap_or_else(|| Value::from("default"));
            Some(TableItem::new(key.clone(), data, Duration::ZERO))
        });
        let v = t.get_with_args("k", &[Value::from("from-args")]).unwrap();
        assert_eq!(text(&v), "from-args");
        assert!(t.exists("k"));
        assert_eq!(t.metrics().loads(), 1);
        assert_eq!(text(&t.get("other").unwrap()), "default");
    }

    #[test]
    fn test_item_veto_refreshes_access() {
        let t = table();
        let item = t.set_sliding("k", Value::from("v"), Duration::from_secs(10));
        item.set_delete_callback(|_| false);
        let before = item.accessed_time();
        thread::sleep(Duration::from_millis(5));

        let returned = t.delete("k").unwrap();
        assert!(Arc::ptr_eq(&returned, &item));
        assert!(t.exists("k"));
        assert!(item.accessed_time() > before);
        assert_eq!(t.metrics().vetoes(), 1);

        item.remove_delete_callback();
        t.delete("k").unwrap();
        assert!(!t.exists("k"));
    }

    #[test]
    fn test_panicking_delete_hook_allows() {
        let t = table();
        t.set("k", Value::from("v"), Duration::ZERO);
        t.set_delete_callback(|_| panic!("hook bug"));
        assert!(t.delete("k").is_ok());
        assert!(!t.exists("k"));
    }

    #[test]
    fn test_timer_expires_absolute_items() {
        let t = table();
        t.set("short", Value::from("s"), Duration::from_millis(30));
        t.set("long", Value::from("l"), Duration::from_secs(60));
        t.set("pinned", Value::from("p"), Duration::ZERO);
        thread::sleep(Duration::from_millis(150));
        assert!(!t.exists("short"));
        assert!(t.exists("long"));
        assert!(t.exists("pinned"));
        assert_eq!(t.metrics().expirations(), 1);
        assert!(t.next_sweep().is_some());
    }

    #[test]
    fn test_shorter_lifespan_reschedules() {
        let t = table();
        t.set("long", Value::from("l"), Duration::from_secs(60));
        thread::sleep(Duration::from_millis(20));
        let armed = t.next_sweep().unwrap();
        t.set("short", Value::from("s"), Duration::from_millis(20));
        thread::sleep(Duration::from_millis(100));
        assert!(!t.exists("short"));
        assert!(t.next_sweep().unwrap() <= armed);
    }

    #[test]
    fn test_clear_disarms_timer() {
        let t = table();
        t.set("k", Value::from("v"), Duration::from_secs(60));
        thread::sleep(Duration::from_millis(20));
        assert!(t.next_sweep().is_some());
        t.clear();
        assert_eq!(t.count(), 0);
        assert!(t.next_sweep().is_none());
    }

    #[test]
    fn test_most_accessed() {
        let t = table();
        for (key, hits) in [("a", 1), ("b", 3), ("c", 2)] {
            t.set(key, Value::from(key), Duration::ZERO);
            for _ in 0..hits {
                t.get(key).unwrap();
            }
        }
        let top: Vec<Key> = t
            .most_accessed(2)
            .iter()
            .map(|item| item.key().clone())
            .collect();
        assert_eq!(top, vec![Key::from("b"), Key::from("c")]);
        assert_eq!(t.most_accessed(10).len(), 3);
    }

    #[test]
    fn test_for_each_may_reenter() {
        let t = table();
        t.set(1, Value::from("x"), Duration::ZERO);
        t.set(2, Value::from("y"), Duration::ZERO);
        let mut seen = 0;
        t.for_each(|key, _| {
            seen += 1;
            t.delete(key).unwrap();
        });
        assert_eq!(seen, 2);
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn test_table_metrics_report() {
        let t = table();
        t.set("k", Value::from("v"), Duration::ZERO);
        t.get("k").unwrap();
        let _ = t.get("missing");
        let m = CacheMetrics::metrics(&t);
        assert_eq!(m["requests"], 2.0);
        assert_eq!(m["cache_hits"], 1.0);
        assert_eq!(m["insertions"], 1.0);
        assert_eq!(t.algorithm_name(), "TableCache");
    }
}
