//! Per-Shard LRU Engine
//!
//! This module provides the fixed-capacity LRU used by every shard (and every
//! tier of a shard) of [`FastCache`](crate::FastCache).
//!
//! # Layout
//!
//! ```text
//! map:   key ──▶ slot (1-based)
//!
//! links: [ sentinel | 1 | 2 | ... | cap ]      prev/next slot indices
//!           │  next ─▶ MRU slot
//!           └─ prev ─▶ LRU slot
//!
//! nodes: [ 1 | 2 | ... | cap ]                 key, value, expire_at, tombstone
//! ```
//!
//! Nodes are written into fresh slots until `last_used_slot == cap`; after
//! that every insert of a new key recycles the tail slot. The map entry of the
//! recycled key is removed in the same call, so a slot is never reachable
//! through a key it no longer holds.
//!
//! # Tombstones
//!
//! Deleting or expiring an entry does not free its slot. The slot is marked as
//! a tombstone, its value is dropped, its map entry is removed, and it is moved
//! to the LRU end so the next recycling insert picks it first.
//!
//! # Performance Characteristics
//!
//! | Operation | Cost |
//! |-----------|------|
//! | `get` hit | O(1), no allocation |
//! | `put` of an existing key | O(1), no allocation |
//! | `put` of a new key | O(1), allocates the stored key |
//! | `delete` | O(1) |
//! | `sweep_expired` | O(slots) |
//!
//! # Thread Safety
//!
//! `LruShard` is not synchronized. [`FastCache`](crate::FastCache) wraps each
//! shard in a `parking_lot::Mutex`; callers using it directly must do the same.

use crate::entry::{Node, Value};
use crate::list::IndexList;
use core::fmt;
use core::num::NonZeroUsize;
use hashbrown::HashMap;

/// Result of [`LruShard::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// A slot that held no live key now holds `key`.
    Inserted,
    /// `key` was already present; its value and deadline were replaced.
    Updated,
    /// The shard was full; the returned key was dropped to make room.
    Evicted(Box<[u8]>),
}

/// Visitor verdict for `for_each` walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Keep visiting.
    Continue,
    /// Stop the walk.
    Stop,
}

impl From<bool> for Walk {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            Walk::Continue
        } else {
            Walk::Stop
        }
    }
}

/// Snapshot of an entry removed by [`LruShard::delete`].
#[derive(Debug, Clone)]
pub struct Removed {
    /// The value the entry held.
    pub value: Value,
    /// The deadline the entry had, `0` for never.
    pub expire_at: u64,
}

/// Outcome of a lookup, distinguishing a lazily expired entry from a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    Hit(usize),
    Expired,
    Miss,
}

/// A fixed-capacity LRU over preallocated slots.
///
/// Time is passed in explicitly as milliseconds from any monotonic clock; a
/// node with `expire_at == 0` never expires and is otherwise live while
/// `now <= expire_at`.
///
/// # Examples
///
/// ```
/// use tiercache::{LruShard, PutOutcome, Value};
/// use core::num::NonZeroUsize;
///
/// let mut shard = LruShard::new(NonZeroUsize::new(2).unwrap());
/// shard.put(b"a", Value::from("1"), 0);
/// shard.put(b"b", Value::from("2"), 0);
/// assert!(shard.get(b"a", 1).is_some());
///
/// // "b" is now the least recently used entry.
/// assert_eq!(
///     shard.put(b"c", Value::from("3"), 0),
///     PutOutcome::Evicted(b"b".to_vec().into_boxed_slice())
/// );
/// ```
pub struct LruShard {
    map: HashMap<Box<[u8]>, usize>,
    list: IndexList,
    nodes: Vec<Node>,
    live: usize,
    shrink_on_delete: bool,
}

impl LruShard {
    /// Creates a shard holding at most `cap` entries.
    pub fn new(cap: NonZeroUsize) -> Self {
        Self::with_options(cap, false)
    }

    /// Creates a shard; with `shrink_on_delete` a tombstoned slot also drops
    /// its key bytes instead of keeping them until the slot is recycled.
    pub fn with_options(cap: NonZeroUsize, shrink_on_delete: bool) -> Self {
        let cap = cap.get();
        LruShard {
            map: HashMap::with_capacity(cap),
            list: IndexList::new(cap),
            nodes: Vec::with_capacity(cap),
            live: 0,
            shrink_on_delete,
        }
    }

    /// Maximum number of entries.
    #[inline]
    pub fn cap(&self) -> usize {
        self.list.cap()
    }

    /// Number of non-tombstone entries, including expired ones not yet swept.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots ever written; reaches `cap` once the shard has filled.
    #[inline]
    pub fn last_used_slot(&self) -> usize {
        self.nodes.len()
    }

    /// Inserts or overwrites `key`, moving it to the MRU position.
    pub fn put(&mut self, key: &[u8], value: Value, expire_at: u64) -> PutOutcome {
        if let Some(&slot) = self.map.get(key) {
            let node = &mut self.nodes[slot - 1];
            debug_assert!(!node.tombstone, "mapped slot {slot} is a tombstone");
            if node.tombstone {
                node.tombstone = false;
                self.live += 1;
            }
            node.value = Some(value);
            node.expire_at = expire_at;
            self.list.move_to_front(slot);
            return PutOutcome::Updated;
        }

        if self.nodes.len() < self.cap() {
            self.nodes.push(Node::new(key.into(), value, expire_at));
            let slot = self.nodes.len();
            self.list.push_front(slot);
            self.map.insert(key.into(), slot);
            self.live += 1;
            return PutOutcome::Inserted;
        }

        let slot = self.list.tail();
        debug_assert!(slot != 0, "full shard with an empty list");
        let node = &mut self.nodes[slot - 1];
        let outcome = if node.tombstone {
            self.live += 1;
            PutOutcome::Inserted
        } else {
            match self.map.remove_entry(&*node.key) {
                Some((old_key, _)) => PutOutcome::Evicted(old_key),
                None => PutOutcome::Evicted(core::mem::take(&mut node.key)),
            }
        };
        node.key = key.into();
        node.value = Some(value);
        node.expire_at = expire_at;
        node.tombstone = false;
        self.map.insert(key.into(), slot);
        self.list.move_to_front(slot);
        outcome
    }

    /// Returns the live node for `key` and promotes it to MRU.
    ///
    /// An entry found past its deadline is tombstoned in place and reported as
    /// a miss.
    pub fn get(&mut self, key: &[u8], now: u64) -> Option<&Node> {
        match self.lookup(key, now) {
            Lookup::Hit(slot) => Some(&self.nodes[slot - 1]),
            Lookup::Expired | Lookup::Miss => None,
        }
    }

    pub(crate) fn lookup(&mut self, key: &[u8], now: u64) -> Lookup {
        let Some(&slot) = self.map.get(key) else {
            return Lookup::Miss;
        };
        if !self.nodes[slot - 1].is_live(now) {
            self.map.remove(key);
            self.tombstone(slot);
            return Lookup::Expired;
        }
        self.list.move_to_front(slot);
        Lookup::Hit(slot)
    }

    #[inline]
    pub(crate) fn node(&self, slot: usize) -> &Node {
        &self.nodes[slot - 1]
    }

    /// Returns the node for `key` without promoting it or checking expiry.
    pub fn peek(&self, key: &[u8]) -> Option<&Node> {
        self.map.get(key).map(|&slot| &self.nodes[slot - 1])
    }

    /// Tombstones `key` and returns what it held.
    ///
    /// The slot stays allocated and moves to the LRU end. Deleting an absent
    /// key is a no-op.
    pub fn delete(&mut self, key: &[u8]) -> Option<Removed> {
        let slot = self.map.remove(key)?;
        let node = &mut self.nodes[slot - 1];
        let expire_at = node.expire_at;
        let value = node.value.take();
        self.tombstone(slot);
        value.map(|value| Removed { value, expire_at })
    }

    /// Visits live entries from MRU to LRU until the visitor says stop.
    ///
    /// Returns [`Walk::Stop`] if the visitor stopped the walk.
    pub fn for_each<F>(&self, now: u64, mut visitor: F) -> Walk
    where
        F: FnMut(&[u8], &Value, u64) -> Walk,
    {
        for slot in self.list.iter() {
            let node = &self.nodes[slot - 1];
            if !node.is_live(now) {
                continue;
            }
            if let Some(value) = node.value.as_ref() {
                if visitor(&node.key, value, node.expire_at) == Walk::Stop {
                    return Walk::Stop;
                }
            }
        }
        Walk::Continue
    }

    /// Tombstones every entry past its deadline. Returns how many were
    /// expired.
    pub fn sweep_expired(&mut self, now: u64) -> usize {
        let mut expired = 0;
        for idx in 0..self.nodes.len() {
            let node = &self.nodes[idx];
            if node.tombstone || node.is_live(now) {
                continue;
            }
            self.map.remove(&*node.key);
            self.tombstone(idx + 1);
            expired += 1;
        }
        expired
    }

    /// Drops every entry and returns the shard to its freshly built state.
    pub fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
        self.nodes.clear();
        self.live = 0;
    }

    /// Marks a slot deleted and parks it at the LRU end. The map entry must
    /// already be gone.
    fn tombstone(&mut self, slot: usize) {
        let node = &mut self.nodes[slot - 1];
        if node.tombstone {
            return;
        }
        node.tombstone = true;
        node.value = None;
        node.expire_at = 0;
        if self.shrink_on_delete {
            node.key = Box::default();
        }
        self.live = self.live.saturating_sub(1);
        self.list.move_to_back(slot);
    }

    /// Walks the links from the sentinel and checks every structural
    /// invariant. Test-only.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let order: Vec<usize> = self.list.iter().collect();
        assert_eq!(order.len(), self.nodes.len(), "every written slot is linked");
        let live = order
            .iter()
            .filter(|&&slot| !self.nodes[slot - 1].tombstone)
            .count();
        assert_eq!(live, self.live, "live count matches reachable live slots");
        assert!(self.live <= self.cap());
        for (key, &slot) in self.map.iter() {
            let node = &self.nodes[slot - 1];
            assert_eq!(&node.key, key, "map points at the slot holding the key");
            assert!(!node.tombstone, "mapped slot is live");
        }
        assert_eq!(self.map.len(), self.live);
    }
}

impl fmt::Debug for LruShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruShard")
            .field("capacity", &self.cap())
            .field("live", &self.live)
            .field("last_used_slot", &self.nodes.len())
            .finish()
    }
}
