//! Delayed-event scheduling.
//!
//! Many independent subscribers each register a single deadline; the
//! scheduler multiplexes them onto one host-owned timer and fires their
//! callbacks in increasing-deadline order. See [`cadence_sched::Scheduler`]
//! for the full contract.
//!
//! This crate is a facade over the workspace members:
//! - [`cadence_time`]: monotonic [`Timestamp`]s and clock sources;
//! - [`cadence_sched`]: the scheduler, its host-timer boundary, and errors.
//!
//! ```
//! use std::time::Duration;
//! use cadence::{FakeClock, ManualTimer, Scheduler};
//!
//! let clock = FakeClock::new();
//! let timer = ManualTimer::new();
//! let mut sched = Scheduler::new(clock.clone(), timer.clone());
//!
//! let event = sched.connect(|_sched, _id, now| {
//!     println!("fired at {} ns", now.as_nanos());
//! })?;
//! sched.schedule_in(event, Duration::from_millis(10))?;
//! assert_eq!(timer.armed_delay_ms(), 10);
//!
//! // The host event loop calls this when the timer elapses.
//! clock.advance(Duration::from_millis(10));
//! sched.on_timer_fire();
//! assert!(timer.is_disabled());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

pub use cadence_sched::{
    ConnectError, EventCallback, EventId, HostTimer, ManualTimer, Result, ScheduleError, Scheduler,
    TimerArmError,
};
pub use cadence_time::{FakeClock, MonotonicClock, StdClock, Timestamp};
