use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

/// The single re-armable timer owned by the host event loop.
///
/// A scheduler owns exactly one of these. `arm(0)` disables the timer;
/// `arm(n)` for positive `n` (re)arms it to fire once after `n`
/// milliseconds, replacing any pending arm. When the timer elapses the host
/// must call [`Scheduler::on_timer_fire`](crate::Scheduler::on_timer_fire).
///
/// Creating the underlying timer source and releasing it again belong to the
/// implementing type's constructor and `Drop`.
pub trait HostTimer {
    fn arm(&mut self, delay_ms: u64) -> Result<(), TimerArmError>;
}

/// The host timer rejected a delay.
#[derive(Debug, Error)]
#[error("host timer rejected a delay of {delay_ms} ms")]
pub struct TimerArmError {
    pub delay_ms: u64,
}

/// In-memory [`HostTimer`] for tests and examples.
///
/// Clones share state: hand one clone to the scheduler and keep another to
/// observe what the scheduler asked of the timer. There is no clock behind
/// it; "firing" is the test calling `on_timer_fire` itself.
#[derive(Clone, Debug, Default)]
pub struct ManualTimer {
    state: Rc<RefCell<ManualTimerState>>,
}

#[derive(Debug, Default)]
struct ManualTimerState {
    delay_ms: u64,
    history: Vec<u64>,
    fail_next: bool,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently armed delay; 0 means the timer is disabled.
    pub fn armed_delay_ms(&self) -> u64 {
        self.state.borrow().delay_ms
    }

    pub fn is_disabled(&self) -> bool {
        self.armed_delay_ms() == 0
    }

    /// Every delay ever passed to [`HostTimer::arm`], in order, including
    /// the 0 disable writes.
    pub fn history(&self) -> Vec<u64> {
        self.state.borrow().history.clone()
    }

    /// Makes the next `arm` call fail, to exercise reprogram-failure paths.
    pub fn fail_next_arm(&self) {
        self.state.borrow_mut().fail_next = true;
    }
}

impl HostTimer for ManualTimer {
    fn arm(&mut self, delay_ms: u64) -> Result<(), TimerArmError> {
        let mut state = self.state.borrow_mut();
        if state.fail_next {
            state.fail_next = false;
            return Err(TimerArmError { delay_ms });
        }
        state.delay_ms = delay_ms;
        state.history.push(delay_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_state() {
        let timer = ManualTimer::new();
        let mut handle = timer.clone();
        handle.arm(25).unwrap();
        assert_eq!(timer.armed_delay_ms(), 25);
        handle.arm(0).unwrap();
        assert!(timer.is_disabled());
        assert_eq!(timer.history(), vec![25, 0]);
    }

    #[test]
    fn injected_failure_hits_exactly_one_arm() {
        let timer = ManualTimer::new();
        let mut handle = timer.clone();
        handle.arm(5).unwrap();
        timer.fail_next_arm();
        let err = handle.arm(9).unwrap_err();
        assert_eq!(err.delay_ms, 9);
        // The failed arm left the previous programming in place.
        assert_eq!(timer.armed_delay_ms(), 5);
        handle.arm(9).unwrap();
        assert_eq!(timer.armed_delay_ms(), 9);
    }
}
