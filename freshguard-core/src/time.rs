//! Time management for the alert engine
//!
//! Two notions of time live side by side:
//! - Reading timestamps: unix seconds, assigned by the data source, used as
//!   the identity of a reading and never compared against the local clock
//! - Clock time: milliseconds from a [`TimeSource`], used only for the
//!   notification cooldown
//!
//! The cooldown measures an interval, so the production source is
//! [`MonotonicTime`]. A wall clock can be stepped by NTP or by hand, and an
//! interval measured across a backwards step would come out short or
//! negative.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timestamp in milliseconds since the source's origin
pub type Timestamp = u64;

/// Source of time for the system
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// Monotonic time source
///
/// Starts at 0 when created and never decreases, whatever happens to the
/// system clock in between.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    /// Clock reading 0 now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Timestamp {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually driven clock for tests and replays
///
/// Clones share the same counter, so a test can keep one handle and
/// advance time while another component owns the other. Unlike
/// [`MonotonicTime`] it can be moved backwards with [`ManualClock::set`].
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock reading `start` until moved
    pub fn new(start: Timestamp) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Jump to `timestamp`
    pub fn set(&self, timestamp: Timestamp) {
        self.now_ms.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Milliseconds elapsed between two clock readings
///
/// `None` when `later` is before `earlier`, i.e. the clock went backwards.
pub fn elapsed_ms(earlier: Timestamp, later: Timestamp) -> Option<u64> {
    later.checked_sub(earlier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now(), 1000);

        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), 1500);
    }

    #[test]
    fn clones_share_time() {
        let clock = ManualClock::new(0);
        let handle = clock.clone();

        handle.advance(Duration::from_secs(10));
        assert_eq!(clock.now(), 10_000);

        handle.set(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn backwards_step_has_no_elapsed_time() {
        assert_eq!(elapsed_ms(2000, 1000), None);
        assert_eq!(elapsed_ms(1000, 2500), Some(1500));
        assert_eq!(elapsed_ms(1000, 1000), Some(0));
    }

    #[test]
    fn monotonic_time_starts_near_zero_and_never_decreases() {
        let clock = MonotonicTime::new();
        let first = clock.now();
        assert!(first < 1_000);

        let mut previous = first;
        for _ in 0..1_000 {
            let now = clock.now();
            assert!(now >= previous);
            previous = now;
        }

        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now() >= first + 5);
    }
}
