//! Table keys and items.

use crate::config::TableCacheConfig;
use crate::entry::Value;
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key of a [`TableCache`](crate::TableCache) entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// A string key.
    Str(String),
    /// An integer key.
    Int(i64),
    /// A raw byte key.
    Bytes(Vec<u8>),
}

impl From<&str> for Key {
    fn from(k: &str) -> Self {
        Key::Str(k.to_owned())
    }
}

impl From<String> for Key {
    fn from(k: String) -> Self {
        Key::Str(k)
    }
}

impl From<i64> for Key {
    fn from(k: i64) -> Self {
        Key::Int(k)
    }
}

impl From<i32> for Key {
    fn from(k: i32) -> Self {
        Key::Int(k.into())
    }
}

impl From<u32> for Key {
    fn from(k: u32) -> Self {
        Key::Int(k.into())
    }
}

impl From<Vec<u8>> for Key {
    fn from(k: Vec<u8>) -> Self {
        Key::Bytes(k)
    }
}

impl From<&[u8]> for Key {
    fn from(k: &[u8]) -> Self {
        Key::Bytes(k.to_vec())
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{i}"),
            Key::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

/// Hook consulted before an item is deleted; `false` vetoes the deletion.
pub type DeleteCallback = Arc<dyn Fn(&Arc<TableItem>) -> bool + Send + Sync>;

/// Where an item stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    Never,
    Expired,
    Remaining(Duration),
}

struct ItemState {
    lifespan: Duration,
    accessed_at: Instant,
    access_count: u64,
    on_delete: Option<DeleteCallback>,
}

/// One entry of a [`TableCache`](crate::TableCache).
///
/// Items are shared as `Arc<TableItem>`; the mutable bookkeeping (access
/// time, access count, sliding lifespan, delete hook) sits behind the item's
/// own lock so readers of the table never need its write lock.
///
/// A zero `lifespan` means the item never expires. A non-sliding item
/// expires `lifespan` after it was created; a sliding item expires once it
/// has not been accessed for `lifespan`.
///
/// # Examples
///
/// ```
/// use tiercache::{TableItem, Value};
/// use std::time::Duration;
///
/// let item = TableItem::new("session", Value::from("token"), Duration::from_secs(60))
///     .with_sliding(true);
/// assert!(item.is_sliding());
/// assert_eq!(item.access_count(), 0);
/// assert!(item.remaining_life().unwrap() <= Duration::from_secs(60));
///
/// let pinned = TableItem::new(7, Value::from("forever"), Duration::ZERO);
/// assert_eq!(pinned.remaining_life(), None);
/// ```
pub struct TableItem {
    key: Key,
    data: Value,
    sliding: bool,
    created_at: Instant,
    state: Mutex<ItemState>,
}

impl TableItem {
    /// Creates an item that expires `lifespan` after creation.
    pub fn new(key: impl Into<Key>, data: Value, lifespan: Duration) -> Self {
        let now = Instant::now();
        TableItem {
            key: key.into(),
            data,
            sliding: false,
            created_at: now,
            state: Mutex::new(ItemState {
                lifespan,
                accessed_at: now,
                access_count: 0,
                on_delete: None,
            }),
        }
    }

    /// Makes the lifespan renew on access.
    #[must_use]
    pub fn with_sliding(mut self, sliding: bool) -> Self {
        self.sliding = sliding;
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Current lifespan; sliding items grow theirs while in use.
    pub fn lifespan(&self) -> Duration {
        self.state.lock().lifespan
    }

    pub fn is_sliding(&self) -> bool {
        self.sliding
    }

    pub fn created_time(&self) -> Instant {
        self.created_at
    }

    pub fn accessed_time(&self) -> Instant {
        self.state.lock().accessed_at
    }

    pub fn access_count(&self) -> u64 {
        self.state.lock().access_count
    }

    /// Time left before the item expires, `None` if it never does.
    pub fn remaining_life(&self) -> Option<Duration> {
        match self.expiry(Instant::now()) {
            Expiry::Never => None,
            Expiry::Expired => Some(Duration::ZERO),
            Expiry::Remaining(left) => Some(left),
        }
    }

    /// Installs the per-item delete hook.
    pub fn set_delete_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<TableItem>) -> bool + Send + Sync + 'static,
    {
        self.state.lock().on_delete = Some(Arc::new(callback));
    }

    pub fn remove_delete_callback(&self) {
        self.state.lock().on_delete = None;
    }

    pub(crate) fn delete_callback(&self) -> Option<DeleteCallback> {
        self.state.lock().on_delete.clone()
    }

    /// Records an access.
    pub(crate) fn touch(&self, now: Instant) {
        let mut state = self.state.lock();
        state.accessed_at = state.accessed_at.max(now);
        state.access_count += 1;
    }

    /// Refreshes the access time without counting an access.
    pub(crate) fn keep_alive(&self, now: Instant) {
        let mut state = self.state.lock();
        state.accessed_at = state.accessed_at.max(now);
    }

    pub(crate) fn expiry(&self, now: Instant) -> Expiry {
        let state = self.state.lock();
        self.expiry_of(&state, now)
    }

    /// Like [`expiry`](Self::expiry), but a sliding item accessed since it
    /// was created and not yet expired has its lifespan grown first.
    pub(crate) fn sweep(&self, now: Instant, config: &TableCacheConfig) -> Expiry {
        let mut state = self.state.lock();
        let used = state.accessed_at > self.created_at;
        if self.sliding && used && self.expiry_of(&state, now) != Expiry::Expired {
            state.lifespan = config.grow_sliding(state.lifespan);
        }
        self.expiry_of(&state, now)
    }

    fn expiry_of(&self, state: &ItemState, now: Instant) -> Expiry {
        if state.lifespan.is_zero() {
            return Expiry::Never;
        }
        let since = if self.sliding {
            state.accessed_at
        } else {
            self.created_at
        };
        let elapsed = now.saturating_duration_since(since);
        if elapsed >= state.lifespan {
            Expiry::Expired
        } else {
            Expiry::Remaining(state.lifespan - elapsed)
        }
    }
}

impl fmt::Debug for TableItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TableItem")
            .field("key", &self.key)
            .field("data", &self.data)
            .field("lifespan", &state.lifespan)
            .field("sliding", &self.sliding)
            .field("access_count", &state.access_count)
            .finish()
    }
}
