//! Background Sweeper
//!
//! A dedicated thread that expires entries one shard per tick and stops itself
//! once the cache has been empty and idle for long enough.
//!
//! ```text
//!            ensure_running() on write          full pass, all shards empty,
//!   ┌─────┐  ───────────────────────────▶  ┌─────────┐  idle >= idle_after
//!   │ off │                                │ running │ ─────────────────────┐
//!   └─────┘  ◀───────────────────────────  └─────────┘                      │
//!      ▲              shutdown()                                            │
//!      └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The thread holds only a [`Weak`] handle to its target, so dropping the cache
//! is never blocked by the sweeper.
//!
//! Writers record their activity time and then read `running` without taking
//! the state lock. Before its idle check the sweeper clears `running` under
//! the lock, then reads the activity time inside `is_idle`, and sets `running`
//! again if it keeps going. Each side writes before it reads, all `SeqCst`, so
//! either the sweeper sees the fresh activity or the writer sees `running ==
//! false` and restarts it. A writer that does so blocks on the state lock
//! until the sweeper has decided.

use crate::clock::now_ms;
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Something the sweeper can expire, one shard at a time.
pub(crate) trait Sweepable: Send + Sync + 'static {
    /// Number of shards; the sweeper cycles through `0..shard_count()`.
    fn shard_count(&self) -> usize;

    /// Expires entries of one shard. Returns how many were expired.
    fn sweep_shard(&self, idx: usize, now: u64) -> usize;

    /// Returns `true` when every shard is empty and the last write is at least
    /// the idle period old. Must read the activity time with `SeqCst`.
    fn is_idle(&self, now: u64) -> bool;
}

#[derive(Default)]
struct SweeperState {
    shutdown: bool,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<SweeperState>,
    wake: Condvar,
    // Written only under `state`.
    running: AtomicBool,
}

/// Owner-side handle of the sweeper thread.
pub(crate) struct Sweeper {
    shared: Arc<Shared>,
    interval: Duration,
}

impl Sweeper {
    /// Creates a stopped sweeper ticking every `interval`. A zero interval
    /// disables it.
    pub(crate) fn new(interval: Duration) -> Self {
        Sweeper {
            shared: Arc::new(Shared {
                state: Mutex::new(SweeperState::default()),
                wake: Condvar::new(),
                running: AtomicBool::new(false),
            }),
            interval,
        }
    }

    #[inline]
    pub(crate) fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Starts the thread unless it is already running, disabled, or shut down.
    pub(crate) fn ensure_running<T: Sweepable>(&self, target: &Arc<T>) {
        if !self.is_enabled() || self.is_running() {
            return;
        }
        let mut state = self.shared.state.lock();
        if state.shutdown || self.is_running() {
            return;
        }
        // A previous thread stopped on idle; it is exiting or gone.
        if let Some(finished) = state.handle.take() {
            let _ = finished.join();
        }

        let shared = Arc::clone(&self.shared);
        let weak = Arc::downgrade(target);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name("tiercache-sweeper".into())
            .spawn(move || run(shared, weak, interval));
        match spawned {
            Ok(handle) => {
                self.shared.running.store(true, Ordering::SeqCst);
                state.handle = Some(handle);
                debug!("sweeper started, tick {:?}", interval);
            }
            Err(err) => warn!("failed to spawn sweeper thread: {err}"),
        }
    }

    /// Stops the thread for good and waits for it to exit.
    pub(crate) fn shutdown(&self) {
        let handle = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.handle.take()
        };
        self.shared.wake.notify_all();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl core::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Sweeper")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

fn run<T: Sweepable>(shared: Arc<Shared>, target: Weak<T>, interval: Duration) {
    let mut idx = 0;
    loop {
        {
            let mut state = shared.state.lock();
            if !state.shutdown {
                shared.wake.wait_for(&mut state, interval);
            }
            if state.shutdown {
                shared.running.store(false, Ordering::SeqCst);
                return;
            }
        }

        let Some(target) = target.upgrade() else {
            let _state = shared.state.lock();
            shared.running.store(false, Ordering::SeqCst);
            return;
        };
        let shards = target.shard_count();
        let expired = target.sweep_shard(idx, now_ms());
        if expired > 0 {
            trace!("sweeper expired {expired} entries in shard {idx}");
        }
        idx = (idx + 1) % shards;

        if idx == 0 {
            let _state = shared.state.lock();
            shared.running.store(false, Ordering::SeqCst);
            if target.is_idle(now_ms()) {
                debug!("sweeper stopped: cache empty and idle");
                return;
            }
            shared.running.store(true, Ordering::SeqCst);
        }
    }
}
