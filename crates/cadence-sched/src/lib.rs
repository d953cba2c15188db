//! A delayed-event scheduler.
//!
//! Many independent subscribers ("events") each register a single absolute
//! deadline; the [`Scheduler`] multiplexes all of them onto one host-owned
//! timer and fires their callbacks in increasing-deadline order.
//!
//! # Design
//!
//! Armed events live in an indexed binary min-heap keyed by deadline, so
//! arming, disarming, and rescheduling are all O(log n), and any event can be
//! removed by identity in O(1) + O(log n) via its stored heap position.
//! Callers never see the heap: [`Scheduler::connect`] hands out an opaque
//! generational [`EventId`], and a stale id (from a disconnected event) is
//! detected and rejected rather than aliasing a recycled slot.
//!
//! The host event loop owns the single low-level timer behind the
//! [`HostTimer`] trait and calls [`Scheduler::on_timer_fire`] when it
//! elapses. The drain loop removes each due event from the heap *before*
//! invoking its callback, so callbacks may freely disarm, reschedule, or
//! disconnect any event, themselves included.
//!
//! Everything is single-threaded and cooperative; no operation blocks.

#![forbid(unsafe_code)]

mod error;
mod host;
mod scheduler;

#[cfg(test)]
mod proptests;

pub use error::{ConnectError, Result, ScheduleError};
pub use host::{HostTimer, ManualTimer, TimerArmError};
pub use scheduler::{EventCallback, EventId, Scheduler};
