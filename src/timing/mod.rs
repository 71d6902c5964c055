//! Timebase shared by the capture controller, the overlay hold and the
//! pipeline driver.
//!
//! Timestamps are durations since the clock's start. Components never read
//! wall time directly, so tests can drive cooldowns and hold expiry with a
//! [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Elapsed time since the clock's start. Never decreases.
    fn now(&self) -> Duration;
}

/// Wall-clock backed monotonic clock.
///
/// Clones share the same start instant.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Arc<Instant>,
}

impl MonotonicClock {
    /// Create a clock with the current instant as time zero
    pub fn new() -> Self {
        Self::from_instant(Instant::now())
    }

    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Timestamp for a given instant. Instants before the start clamp to zero.
    #[inline]
    pub fn at(&self, instant: Instant) -> Duration {
        instant.saturating_duration_since(*self.start)
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos
            .fetch_add(duration_to_nanos(by), Ordering::SeqCst);
    }

    /// Jump to `to`. Moving backwards is ignored.
    pub fn set(&self, to: Duration) {
        self.nanos
            .fetch_max(duration_to_nanos(to), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
