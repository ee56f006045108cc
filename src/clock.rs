//! Millisecond monotonic clock shared by the sharded cache and its sweeper.

use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds since the first use of the clock in this process, plus one.
///
/// Never returns `0`, which is reserved for "never expires".
#[inline]
pub(crate) fn now_ms() -> u64 {
    duration_ms(EPOCH.elapsed()).saturating_add(1)
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
#[inline]
pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_nonzero_and_monotonic() {
        let a = now_ms();
        std::thread::sleep(Duration::from_millis(5));
        let b = now_ms();
        assert!(a >= 1);
        assert!(b >= a + 5);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(250)), 250);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }
}
