//! Monotonic time modelling for the delayed-event scheduler.
//!
//! The scheduler uses a single monotonic clock identity for all of its
//! arithmetic: deadlines, due checks, and re-arm delays are all computed
//! against the same [`MonotonicClock`]. In production this is [`StdClock`]
//! (anchored `std::time::Instant`), while unit tests drive the system
//! deterministically via [`FakeClock`].

#![forbid(unsafe_code)]

mod clock;
mod timestamp;

pub use clock::{FakeClock, MonotonicClock, StdClock};
pub use timestamp::Timestamp;
