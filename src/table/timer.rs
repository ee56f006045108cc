//! Single-timer expiration worker for the TTL table.
//!
//! The table owns one timer: a worker thread that sleeps until the nearest
//! deadline, sweeps, and re-arms itself for the nearest remaining lifetime.
//! A write that introduces an earlier deadline wakes the worker for an
//! immediate sweep, which re-arms the timer in turn.
//!
//! The worker is spawned on the first arm and holds only a [`Weak`] handle to
//! the table state.

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Something the timer can expire.
pub(crate) trait Expiring: Send + Sync + 'static {
    /// Removes expired entries. Returns the smallest remaining lifetime of
    /// what is left, `None` if nothing left can expire.
    fn expire(&self, now: Instant) -> Option<Duration>;
}

#[derive(Default)]
struct TimerState {
    next_at: Option<Instant>,
    shutdown: bool,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

pub(crate) struct Timer {
    shared: Arc<Shared>,
    min_interval: Duration,
}

impl Timer {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Timer {
            shared: Arc::new(Shared {
                state: Mutex::new(TimerState::default()),
                wake: Condvar::new(),
            }),
            min_interval,
        }
    }

    /// When the next sweep is due, `None` while disarmed.
    pub(crate) fn next_sweep(&self) -> Option<Instant> {
        self.shared.state.lock().next_at
    }

    /// Requests an immediate sweep if `deadline` comes before the armed
    /// time, or if the timer is disarmed.
    pub(crate) fn expedite<T: Expiring>(&self, deadline: Instant, target: &Arc<T>) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        if matches!(state.next_at, Some(at) if at <= deadline) {
            return;
        }
        state.next_at = Some(Instant::now());
        if state.worker.is_none() {
            self.spawn(&mut state, target);
        }
        drop(state);
        self.shared.wake.notify_all();
    }

    /// Disarms the timer. The worker stays parked until the next arm.
    pub(crate) fn cancel(&self) {
        self.shared.state.lock().next_at = None;
        self.shared.wake.notify_all();
    }

    pub(crate) fn shutdown(&self) {
        let worker = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.next_at = None;
            state.worker.take()
        };
        self.shared.wake.notify_all();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }

    fn spawn<T: Expiring>(&self, state: &mut TimerState, target: &Arc<T>) {
        let shared = Arc::clone(&self.shared);
        let weak = Arc::downgrade(target);
        let min_interval = self.min_interval;
        let spawned = thread::Builder::new()
            .name("tiercache-table-timer".into())
            .spawn(move || run(shared, weak, min_interval));
        match spawned {
            Ok(worker) => {
                state.worker = Some(worker);
                debug!("table timer started");
            }
            Err(err) => warn!("failed to spawn table timer thread: {err}"),
        }
    }
}

impl core::fmt::Debug for Timer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Timer")
            .field("next_at", &state.next_at)
            .field("started", &state.worker.is_some())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

fn run<T: Expiring>(shared: Arc<Shared>, target: Weak<T>, min_interval: Duration) {
    loop {
        {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    debug!("table timer stopped");
                    return;
                }
                let next_at = state.next_at;
                match next_at {
                    None => shared.wake.wait(&mut state),
                    Some(at) if at <= Instant::now() => {
                        state.next_at = None;
                        break;
                    }
                    Some(at) => {
                        shared.wake.wait_until(&mut state, at);
                    }
                }
            }
        }

        let Some(table) = target.upgrade() else {
            return;
        };
        let next = table.expire(Instant::now());
        drop(table);

        if let Some(delay) = next {
            let at = Instant::now() + delay.max(min_interval);
            let mut state = shared.state.lock();
            // A write may have asked for an earlier sweep meanwhile.
            state.next_at = Some(state.next_at.map_or(at, |current| current.min(at)));
            trace!("table timer re-armed in {:?}", delay.max(min_interval));
        }
    }
}
