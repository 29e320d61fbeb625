use std::cell::Cell;
use std::time::Duration;
use std::time::Instant;

/// The cooperative wall-clock contract used by every "timer expired" check in
/// the main loops (spec.md §5): `now()` returns a monotonic duration since
/// the clock was created, never wall time, so it cannot go backwards across
/// a leap second or system clock adjustment.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// The real clock, backed by [`std::time::Instant`].
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> MonotonicClock {
        MonotonicClock { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// A clock whose time is advanced explicitly, for deterministic
/// timer-expiry tests (spec.md §8 "Timer honesty").
#[derive(Default)]
pub struct FakeClock {
    elapsed: Cell<Duration>,
}

impl FakeClock {
    pub fn new() -> FakeClock {
        FakeClock::default()
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.elapsed.get()
    }
}
