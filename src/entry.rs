//! Value slots and LRU nodes.
//!
//! [`Value`] is the payload carried by both engines. The cache never looks
//! inside it: it is either an opaque shared handle to any `Send + Sync` type or
//! an immutable byte buffer. Cloning a `Value` only bumps a reference count.
//!
//! [`Node`] is one preallocated slot of a shard. Slots are written in place and
//! recycled; they are never freed while the shard lives.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

/// A cached value.
///
/// # Examples
///
/// ```
/// use tiercache::Value;
///
/// let v = Value::any(42u32);
/// assert_eq!(v.downcast_ref::<u32>(), Some(&42));
///
/// let b = Value::bytes(b"hello".to_vec());
/// assert_eq!(b.as_bytes(), Some(&b"hello"[..]));
/// ```
#[derive(Clone)]
pub enum Value {
    /// Any shared value. The engine never inspects it.
    Any(Arc<dyn Any + Send + Sync>),
    /// An immutable byte buffer.
    Bytes(Arc<[u8]>),
}

impl Value {
    /// Wraps an arbitrary value.
    pub fn any<T: Any + Send + Sync>(value: T) -> Self {
        Value::Any(Arc::new(value))
    }

    /// Wraps a byte buffer.
    pub fn bytes(value: impl Into<Arc<[u8]>>) -> Self {
        Value::Bytes(value.into())
    }

    /// Returns the byte buffer if this is the `Bytes` variant.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Any(_) => None,
        }
    }

    /// Downcasts the `Any` variant to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Any(v) => v.downcast_ref::<T>(),
            Value::Bytes(_) => None,
        }
    }

    /// Opaque identity of the payload, for logging and event callbacks.
    pub fn handle(&self) -> ValueHandle {
        match self {
            Value::Any(v) => ValueHandle(Arc::as_ptr(v) as *const () as usize),
            Value::Bytes(b) => ValueHandle(Arc::as_ptr(b) as *const u8 as usize),
        }
    }

    /// Returns `true` if both values share the same payload.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        self.handle() == other.handle()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Any(_) => f.debug_tuple("Any").field(&self.handle()).finish(),
            Value::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v.into())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().into())
    }
}

/// An opaque address identifying a value payload.
///
/// For identity and logging only. It is not dereferenceable and must not be
/// retained past the callback it was handed to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueHandle(pub usize);

impl ValueHandle {
    /// The handle passed to callbacks on a miss.
    pub const NULL: ValueHandle = ValueHandle(0);

    /// Returns `true` for [`ValueHandle::NULL`].
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ValueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One slot of a shard.
///
/// `expire_at == 0` means the entry never expires. A tombstoned slot has no
/// map entry and no value; its storage is reused by a later insert.
pub struct Node {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Option<Value>,
    pub(crate) expire_at: u64,
    pub(crate) tombstone: bool,
}

impl Node {
    pub(crate) fn new(key: Box<[u8]>, value: Value, expire_at: u64) -> Self {
        Node {
            key,
            value: Some(value),
            expire_at,
            tombstone: false,
        }
    }

    /// Live iff not tombstoned and not past its deadline.
    #[inline]
    pub(crate) fn is_live(&self, now: u64) -> bool {
        !self.tombstone && (self.expire_at == 0 || now <= self.expire_at)
    }

    /// Key of the slot.
    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Value of the slot, `None` once tombstoned.
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Absolute deadline in cache milliseconds, `0` for never.
    #[inline]
    pub fn expire_at(&self) -> u64 {
        self.expire_at
    }

    /// Returns `true` once the slot has been deleted or expired.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.tombstone
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key_len", &self.key.len())
            .field("value", &self.value)
            .field("expire_at", &self.expire_at)
            .field("tombstone", &self.tombstone)
            .finish()
    }
}
