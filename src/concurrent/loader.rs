//! Request Coalescing
//!
//! [`CoalescedLoader`] guarantees that at most one producer runs per key at a
//! time. The first caller for a key becomes the leader and runs the producer
//! with no cache lock held; everyone else arriving while it runs waits on the
//! same flight and receives a clone of the leader's outcome.
//!
//! ```text
//!   caller A ──claim──▶ Leader ──produce()──▶ publish ──▶ forget flight
//!   caller B ──claim──▶ Waiter ──────wait──────────────▶ same outcome
//!   caller C ──claim──▶ Waiter ──────wait──────────────▶ same outcome
//! ```
//!
//! The flight record is removed as soon as the outcome is published, so a
//! later call starts a fresh flight instead of observing a stale result.
//! A panicking producer is caught; the leader and every waiter receive
//! [`CacheError::ProducerFailed`].

use crate::error::{CacheError, Result};
use core::borrow::Borrow;
use core::fmt;
use core::hash::Hash;
use hashbrown::HashMap;
use log::warn;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

struct Flight<T> {
    outcome: Mutex<Option<Result<T>>>,
    done: Condvar,
}

impl<T: Clone> Flight<T> {
    fn new() -> Self {
        Flight {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<T> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut outcome);
        }
    }

    fn publish(&self, result: Result<T>) {
        *self.outcome.lock() = Some(result);
        self.done.notify_all();
    }
}

enum Role<T> {
    Leader(Arc<Flight<T>>),
    Waiter(Arc<Flight<T>>),
}

/// Per-key single-flight execution.
///
/// # Examples
///
/// ```
/// use tiercache::CoalescedLoader;
///
/// let loader: CoalescedLoader<String, u32> = CoalescedLoader::new();
/// let value = loader.load("answer", || Ok(42)).unwrap();
/// assert_eq!(value, 42);
/// assert_eq!(loader.in_flight(), 0);
/// ```
pub struct CoalescedLoader<K, T> {
    flights: Mutex<HashMap<K, Arc<Flight<T>>>>,
}

impl<K, T> CoalescedLoader<K, T>
where
    K: Hash + Eq,
    T: Clone,
{
    /// Creates a loader with no flights.
    pub fn new() -> Self {
        CoalescedLoader {
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `produce` for `key` unless a flight for `key` is already running,
    /// in which case this call waits for and returns that flight's outcome.
    pub fn load<Q, F>(&self, key: &Q, produce: F) -> Result<T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
        F: FnOnce() -> Result<T>,
    {
        match self.claim(key) {
            Role::Waiter(flight) => flight.wait(),
            Role::Leader(flight) => {
                let result = match catch_unwind(AssertUnwindSafe(produce)) {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("read-through producer panicked");
                        Err(CacheError::ProducerFailed("producer panicked".into()))
                    }
                };
                flight.publish(result.clone());
                self.flights.lock().remove(key);
                result
            }
        }
    }

    /// Number of keys with a producer currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    fn claim<Q>(&self, key: &Q) -> Role<T>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
    {
        let mut flights = self.flights.lock();
        if let Some(existing) = flights.get(key) {
            return Role::Waiter(Arc::clone(existing));
        }
        let flight = Arc::new(Flight::new());
        flights.insert(key.to_owned(), Arc::clone(&flight));
        Role::Leader(flight)
    }
}

impl<K: Hash + Eq, T: Clone> Default for CoalescedLoader<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for CoalescedLoader<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoalescedLoader")
            .field("in_flight", &self.flights.lock().len())
            .finish()
    }
}
