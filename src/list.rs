//! Fixed-capacity doubly linked list encoded over an index array.
//!
//! The list never owns values. It only orders the slots `1..=cap` of a
//! companion node array (see [`crate::lru`]). `links[0]` is the sentinel:
//! `links[0].next` is the head (most recently used) and `links[0].prev` is the
//! tail (least recently used). Index `0` inside any other link means "none",
//! which is the same as pointing at the sentinel, so splices need no branches.

use core::fmt;

/// A `prev`/`next` pair of 1-based slot indices.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub(crate) struct Link {
    pub(crate) prev: usize,
    pub(crate) next: usize,
}

/// An index-linked list over the slots `1..=cap`.
///
/// All operations are O(1) and allocation-free after [`IndexList::new`].
/// Callers are responsible for only passing slot indices that are in range and
/// (for [`unlink`](IndexList::unlink) and the `move_*` helpers) currently linked.
pub(crate) struct IndexList {
    links: Box<[Link]>,
    len: usize,
}

impl IndexList {
    /// Creates a list able to order `cap` slots.
    pub(crate) fn new(cap: usize) -> Self {
        IndexList {
            links: vec![Link::default(); cap + 1].into_boxed_slice(),
            len: 0,
        }
    }

    /// Maximum slot index.
    #[inline]
    pub(crate) fn cap(&self) -> usize {
        self.links.len() - 1
    }

    /// Number of linked slots.
    #[cfg(test)]
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot at the MRU end, `0` when empty.
    #[inline]
    pub(crate) fn head(&self) -> usize {
        self.links[0].next
    }

    /// Slot at the LRU end, `0` when empty.
    #[inline]
    pub(crate) fn tail(&self) -> usize {
        self.links[0].prev
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn link(&self, slot: usize) -> Link {
        self.links[slot]
    }

    /// Links a detached slot at the MRU end.
    pub(crate) fn push_front(&mut self, slot: usize) {
        debug_assert!(slot >= 1 && slot <= self.cap(), "slot {slot} out of range");
        self.attach_front(slot);
        self.len += 1;
    }

    /// Links a detached slot at the LRU end.
    #[cfg(test)]
    pub(crate) fn push_back(&mut self, slot: usize) {
        debug_assert!(slot >= 1 && slot <= self.cap(), "slot {slot} out of range");
        self.attach_back(slot);
        self.len += 1;
    }

    /// Detaches a linked slot.
    #[cfg(test)]
    pub(crate) fn unlink(&mut self, slot: usize) {
        debug_assert!(self.len > 0, "unlink on empty list");
        self.detach(slot);
        self.len -= 1;
    }

    /// Moves a linked slot to the MRU end.
    #[inline]
    pub(crate) fn move_to_front(&mut self, slot: usize) {
        if self.links[0].next == slot {
            return;
        }
        self.detach(slot);
        self.attach_front(slot);
    }

    /// Moves a linked slot to the LRU end.
    #[inline]
    pub(crate) fn move_to_back(&mut self, slot: usize) {
        if self.links[0].prev == slot {
            return;
        }
        self.detach(slot);
        self.attach_back(slot);
    }

    /// Iterates slots from MRU to LRU.
    pub(crate) fn iter(&self) -> Iter<'_> {
        Iter {
            links: &self.links,
            cursor: self.links[0].next,
            forward: true,
        }
    }

    /// Iterates slots from LRU to MRU.
    #[cfg(test)]
    pub(crate) fn iter_rev(&self) -> Iter<'_> {
        Iter {
            links: &self.links,
            cursor: self.links[0].prev,
            forward: false,
        }
    }

    /// Unlinks every slot.
    pub(crate) fn clear(&mut self) {
        for link in self.links.iter_mut() {
            *link = Link::default();
        }
        self.len = 0;
    }

    #[inline]
    fn detach(&mut self, slot: usize) {
        let Link { prev, next } = self.links[slot];
        self.links[prev].next = next;
        self.links[next].prev = prev;
        self.links[slot] = Link::default();
    }

    #[inline]
    fn attach_front(&mut self, slot: usize) {
        let old_head = self.links[0].next;
        self.links[slot] = Link {
            prev: 0,
            next: old_head,
        };
        self.links[0].next = slot;
        self.links[old_head].prev = slot;
    }

    #[inline]
    fn attach_back(&mut self, slot: usize) {
        let old_tail = self.links[0].prev;
        self.links[slot] = Link {
            prev: old_tail,
            next: 0,
        };
        self.links[0].prev = slot;
        self.links[old_tail].next = slot;
    }
}

impl fmt::Debug for IndexList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexList")
            .field("cap", &self.cap())
            .field("len", &self.len)
            .field("head", &self.head())
            .field("tail", &self.tail())
            .finish()
    }
}

/// Slot iterator over an [`IndexList`], in either direction.
pub(crate) struct Iter<'a> {
    links: &'a [Link],
    cursor: usize,
    forward: bool,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == 0 {
            return None;
        }
        let slot = self.cursor;
        let link = self.links[slot];
        self.cursor = if self.forward { link.next } else { link.prev };
        Some(slot)
    }
}
