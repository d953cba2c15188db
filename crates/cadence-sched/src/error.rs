use std::collections::TryReserveError;

use thiserror::Error;

use crate::host::TimerArmError;

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;

/// Failure to register a new event.
///
/// Connecting is all-or-nothing: on failure the scheduler is unchanged and
/// no event was registered.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("allocation failure when expanding scheduler: {0}")]
    Alloc(#[from] TryReserveError),
}

/// Failure to arm an event.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The id is stale: the event was disconnected (or never belonged to
    /// this scheduler).
    #[error("event is not connected to this scheduler")]
    Disconnected,

    /// The host timer rejected the computed wake-up delay. The event is
    /// still armed and the heap is still consistent; only the physical wake
    /// timing is now unreliable.
    #[error(transparent)]
    Timer(#[from] TimerArmError),
}
