use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::Timestamp;

/// A monotonic clock source.
///
/// One clock identity backs all of a scheduler's time arithmetic; mixing
/// timestamps from different sources is a caller bug.
pub trait MonotonicClock {
    fn now(&self) -> Timestamp;
}

/// Host monotonic clock, anchored at construction time.
///
/// `now()` reports the time elapsed since the clock was created, so the first
/// reading is close to [`Timestamp::ZERO`].
#[derive(Clone, Debug)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for StdClock {
    fn now(&self) -> Timestamp {
        let elapsed = self.origin.elapsed();
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        Timestamp::from_nanos(ns)
    }
}

/// Deterministic clock for tests.
///
/// Clones share the same underlying time cell, so a test can hand one clone
/// to the scheduler and keep another to advance time between steps. Time
/// never moves unless told to, and only forwards.
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    now_ns: Rc<Cell<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let delta_ns = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        self.now_ns
            .set(self.now_ns.get().saturating_add(delta_ns));
    }

    /// Jumps the clock to an absolute reading. Must not move time backwards.
    pub fn set_nanos(&self, now_ns: u64) {
        debug_assert!(now_ns >= self.now_ns.get(), "fake clock moved backwards");
        self.now_ns.set(now_ns);
    }
}

impl MonotonicClock for FakeClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.now_ns.get())
    }
}
