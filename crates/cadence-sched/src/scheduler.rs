use std::time::Duration;

use cadence_time::{MonotonicClock, Timestamp};
use tracing::{error, warn};

use crate::error::{ConnectError, ScheduleError};
use crate::host::HostTimer;

/// Extra absorption time when deciding which events are due, so an event due
/// a fraction of a millisecond after the timer tick fires now instead of
/// forcing a 1 ms re-arm.
const FIRE_SLACK: Duration = Duration::from_millis(1);

/// Opaque handle to a connected event.
///
/// Ids are generational: once the event is disconnected, its id goes stale
/// and every scheduler operation rejects it, even if the internal slot has
/// been reused by a later `connect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId {
    slot: u32,
    generation: u32,
}

/// Callback invoked when an event's deadline passes.
///
/// Receives the scheduler itself, the firing event's id, and a timestamp
/// read just before the drain began. The event has already been disarmed, so
/// the callback may reschedule it (or mutate any other event) freely.
pub type EventCallback<C, T> = Box<dyn FnMut(&mut Scheduler<C, T>, EventId, Timestamp)>;

struct EventEntry<C: MonotonicClock, T: HostTimer> {
    /// `None` while connected but unarmed.
    deadline: Option<Timestamp>,
    /// Current position in `slots`. Always valid while connected.
    rank: usize,
    /// Value of the scheduler's arm counter when this event was last armed.
    /// The drain loop uses it to skip events armed mid-drain.
    armed_seq: u64,
    /// Taken out for the duration of an invocation, put back afterwards.
    callback: Option<EventCallback<C, T>>,
}

struct ArenaSlot<C: MonotonicClock, T: HostTimer> {
    generation: u32,
    entry: Option<EventEntry<C, T>>,
}

/// Multiplexes many one-shot deadlines onto a single host timer.
///
/// `slots` is partitioned: `[0, active_count)` is a binary min-heap ordered
/// by deadline (the root is the event due soonest), and
/// `[active_count, len)` holds connected-but-unarmed events in no particular
/// order. Each entry stores its own rank so removal by identity never needs
/// a search.
pub struct Scheduler<C: MonotonicClock, T: HostTimer> {
    slots: Vec<EventId>,
    entries: Vec<ArenaSlot<C, T>>,
    free: Vec<u32>,
    active_count: usize,
    /// Logical capacity of `slots`: doubles when full (starting at 8),
    /// halves when usage drops below a quarter (only from 16 up).
    space: usize,
    arm_seq: u64,
    clock: C,
    timer: T,
}

impl<C: MonotonicClock, T: HostTimer> Scheduler<C, T> {
    /// Creates an empty scheduler owning `timer` and reading `clock`.
    ///
    /// The timer and the clock must agree on one monotonic time identity:
    /// the delays handed to [`HostTimer::arm`] are computed from `clock`
    /// readings.
    pub fn new(clock: C, timer: T) -> Self {
        Self {
            slots: Vec::new(),
            entries: Vec::new(),
            free: Vec::new(),
            active_count: 0,
            space: 0,
            arm_seq: 0,
            clock,
            timer,
        }
    }

    /// Total connected events.
    pub fn connected_count(&self) -> usize {
        self.slots.len()
    }

    /// Events currently armed (participating in the heap).
    pub fn armed_count(&self) -> usize {
        self.active_count
    }

    /// Current logical slot capacity, exposed for capacity-policy tests.
    pub fn capacity(&self) -> usize {
        self.space
    }

    pub fn is_connected(&self, id: EventId) -> bool {
        self.entry(id).is_some()
    }

    /// The event's deadline, or `None` if it is unarmed or stale.
    pub fn deadline(&self, id: EventId) -> Option<Timestamp> {
        self.entry(id).and_then(|entry| entry.deadline)
    }

    pub fn is_armed(&self, id: EventId) -> bool {
        self.deadline(id).is_some()
    }

    /// Registers a new event. The event starts unarmed and the timer is not
    /// touched.
    ///
    /// Fails only if growing storage fails, in which case the scheduler is
    /// unchanged.
    pub fn connect<F>(&mut self, callback: F) -> Result<EventId, ConnectError>
    where
        F: FnMut(&mut Scheduler<C, T>, EventId, Timestamp) + 'static,
    {
        if self.slots.len() == self.space {
            let new_space = if self.space >= 8 { self.space * 2 } else { 8 };
            if let Err(err) = self.slots.try_reserve_exact(new_space - self.slots.len()) {
                error!("allocation failure when expanding scheduler");
                return Err(err.into());
            }
            self.space = new_space;
        }

        let rank = self.slots.len();
        let id = match self.free.pop() {
            Some(slot) => {
                let generation = self.entries[slot as usize].generation;
                EventId { slot, generation }
            }
            None => {
                if let Err(err) = self.entries.try_reserve(1) {
                    error!("allocation failure when expanding scheduler");
                    return Err(err.into());
                }
                let slot = u32::try_from(self.entries.len())
                    .expect("scheduler slot count exceeds u32");
                self.entries.push(ArenaSlot {
                    generation: 0,
                    entry: None,
                });
                EventId {
                    slot,
                    generation: 0,
                }
            }
        };

        self.entries[id.slot as usize].entry = Some(EventEntry {
            deadline: None,
            rank,
            armed_seq: 0,
            callback: Some(Box::new(callback)),
        });
        self.slots.push(id);
        Ok(id)
    }

    /// Unregisters an event, disarming it first if needed. The id goes
    /// stale. Returns `false` (and does nothing) if it is stale already.
    pub fn disconnect(&mut self, id: EventId) -> bool {
        if self.entry(id).is_none() {
            return false;
        }

        self.disarm(id);

        // Swap-remove from the connected set, fixing the moved event's rank.
        let rank = self.entry_at(id).rank;
        let last = self.slots.len() - 1;
        if rank != last {
            let moved = self.slots[last];
            self.slots[rank] = moved;
            self.entry_at_mut(moved).rank = rank;
        }
        self.slots.pop();

        let slot = &mut self.entries[id.slot as usize];
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);

        if self.space >= 16 && self.space >= 4 * self.slots.len() {
            self.space /= 2;
            self.slots.shrink_to(self.space);
        }
        true
    }

    /// Arms (or re-arms) an event for an absolute deadline.
    ///
    /// If the event ends up with the earliest deadline in the system, the
    /// host timer is reprogrammed for it: whole milliseconds until the
    /// deadline, rounded toward zero, clamped to a minimum of 1 ms. The
    /// clamp keeps a past deadline firing on the very next tick and avoids
    /// the `arm(0)` disable signal.
    ///
    /// A timer reprogram failure is surfaced, but the event stays armed with
    /// correct heap rank: logical ordering is intact, only the physical wake
    /// timing is in doubt.
    pub fn schedule(&mut self, id: EventId, deadline: Timestamp) -> Result<(), ScheduleError> {
        let armed = match self.entry(id) {
            Some(entry) => entry.deadline.is_some(),
            None => return Err(ScheduleError::Disconnected),
        };
        if armed {
            self.disarm(id);
        }

        // Move the event into the active region: swap with the first
        // inactive slot, then restore the heap order from there.
        let rank = self.entry_at(id).rank;
        let dest = self.active_count;
        if rank != dest {
            self.swap_slots(rank, dest);
        }
        self.active_count += 1;
        self.arm_seq += 1;
        let armed_seq = self.arm_seq;
        {
            let entry = self.entry_at_mut(id);
            entry.deadline = Some(deadline);
            entry.armed_seq = armed_seq;
        }

        if self.sift_up(dest) == 0 {
            // Now the root element, due strictly earlier than anything
            // else: reprogram the timer.
            let now = self.clock.now();
            self.timer.arm(delay_ms_until(now, deadline))?;
        }
        Ok(())
    }

    /// Arms an event for `delay` after the current clock reading.
    pub fn schedule_in(&mut self, id: EventId, delay: Duration) -> Result<(), ScheduleError> {
        let deadline = self.clock.now().saturating_add(delay);
        self.schedule(id, deadline)
    }

    /// Disarms an event. Returns `false` (and does nothing) if it is stale
    /// or already unarmed, so a second disarm is a no-op.
    ///
    /// Disarming the last armed event switches the host timer off.
    /// Disarming a non-root event never reprograms the timer; disarming the
    /// root of a larger heap leaves the timer on its old (now early)
    /// deadline, and the resulting drain finds nothing due and re-arms.
    pub fn disarm(&mut self, id: EventId) -> bool {
        match self.entry(id) {
            Some(entry) if entry.deadline.is_some() => {}
            _ => return false,
        }
        self.entry_at_mut(id).deadline = None;

        if self.active_count <= 1 {
            self.active_count = 0;
            // This was the last armed event, turn off the timer.
            if let Err(err) = self.timer.arm(0) {
                warn!(error = %err, "failed to disable host timer");
            }
            return true;
        }

        let rank = self.entry_at(id).rank;
        let last = self.active_count - 1;
        if rank == last {
            self.active_count -= 1;
        } else {
            self.swap_slots(rank, last);
            self.active_count -= 1;
            // Settle the displaced event: only one of the two sifts can
            // have any effect.
            let settled = self.sift_down(rank);
            self.sift_up(settled);
        }
        true
    }

    /// Drains due events and re-arms the timer; the host event loop must
    /// call this when the [`HostTimer`] elapses.
    ///
    /// Each due event is disarmed *before* its callback runs, and the heap
    /// root is re-read fresh on every iteration, so callbacks may disarm,
    /// reschedule, or disconnect events at will. Events armed while the
    /// drain is running (even for already-past deadlines) are left for the
    /// next invocation, which bounds the loop; the 1 ms re-arm clamp
    /// guarantees that invocation is coming.
    pub fn on_timer_fire(&mut self) {
        let now = self.clock.now();
        let expiry = now.saturating_add(FIRE_SLACK);
        let seq_floor = self.arm_seq;

        while self.active_count > 0 {
            let root = self.slots[0];
            let (deadline, armed_seq) = {
                let entry = self.entry_at(root);
                (entry.deadline, entry.armed_seq)
            };
            let due = deadline.is_some_and(|deadline| deadline < expiry);
            if !due || armed_seq > seq_floor {
                break;
            }

            // Disarm before invoking, so a callback that reschedules the
            // event observes consistent state.
            self.disarm(root);
            if let Some(mut callback) = self.entry_at_mut(root).callback.take() {
                callback(self, root, now);
                // The callback may have disconnected the event; only a
                // still-live entry gets its callback back.
                if let Some(entry) = self.entry_mut(root) {
                    entry.callback = Some(callback);
                }
            }
        }

        if self.active_count > 0 {
            let deadline = self.active_deadline(0);
            if let Err(err) = self.timer.arm(delay_ms_until(now, deadline)) {
                warn!(error = %err, "failed to re-arm host timer");
            }
        } else if let Err(err) = self.timer.arm(0) {
            warn!(error = %err, "failed to disable host timer");
        }
    }

    fn entry(&self, id: EventId) -> Option<&EventEntry<C, T>> {
        let slot = self.entries.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: EventId) -> Option<&mut EventEntry<C, T>> {
        let slot = self.entries.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Resolves an id known to be connected (it came out of `slots`).
    fn entry_at(&self, id: EventId) -> &EventEntry<C, T> {
        self.entries[id.slot as usize]
            .entry
            .as_ref()
            .expect("slot array holds a disconnected event")
    }

    fn entry_at_mut(&mut self, id: EventId) -> &mut EventEntry<C, T> {
        self.entries[id.slot as usize]
            .entry
            .as_mut()
            .expect("slot array holds a disconnected event")
    }

    fn active_deadline(&self, rank: usize) -> Timestamp {
        self.entry_at(self.slots[rank])
            .deadline
            .expect("active region holds an unarmed event")
    }

    /// Swaps two slots and fixes both events' stored ranks.
    fn swap_slots(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
        let id_a = self.slots[a];
        let id_b = self.slots[b];
        self.entry_at_mut(id_a).rank = a;
        self.entry_at_mut(id_b).rank = b;
    }

    /// Moves the event at `rank` toward the root while it is strictly
    /// earlier than its parent. Returns its final rank.
    fn sift_up(&mut self, mut rank: usize) -> usize {
        while rank > 0 {
            let parent = (rank - 1) / 2;
            if self.active_deadline(rank) < self.active_deadline(parent) {
                self.swap_slots(rank, parent);
                rank = parent;
            } else {
                break;
            }
        }
        rank
    }

    /// Moves the event at `rank` away from the root, always swapping with
    /// its earlier active child. Returns its final rank.
    fn sift_down(&mut self, mut rank: usize) -> usize {
        loop {
            let left = rank * 2 + 1;
            let right = rank * 2 + 2;
            if left >= self.active_count {
                return rank;
            }
            let child = if right < self.active_count
                && self.active_deadline(right) < self.active_deadline(left)
            {
                right
            } else {
                left
            };
            if self.active_deadline(child) < self.active_deadline(rank) {
                self.swap_slots(rank, child);
                rank = child;
            } else {
                return rank;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        let occupied = self
            .entries
            .iter()
            .filter(|slot| slot.entry.is_some())
            .count();
        assert_eq!(self.slots.len(), occupied, "slot/arena count mismatch");
        assert!(self.active_count <= self.slots.len());
        assert!(self.space >= self.slots.len());

        for (rank, &id) in self.slots.iter().enumerate() {
            let entry = self.entry(id).expect("slot array holds a stale id");
            assert_eq!(entry.rank, rank, "stored rank out of sync");
            if rank < self.active_count {
                assert!(entry.deadline.is_some(), "unarmed event in heap region");
            } else {
                assert!(entry.deadline.is_none(), "armed event outside the heap");
            }
        }

        for rank in 1..self.active_count {
            let parent = (rank - 1) / 2;
            assert!(
                self.active_deadline(parent) <= self.active_deadline(rank),
                "heap property violated at rank {rank}"
            );
        }
    }
}

impl<C: MonotonicClock, T: HostTimer> Drop for Scheduler<C, T> {
    fn drop(&mut self) {
        // Leave the host timer disabled; the timer value's own Drop
        // releases the underlying source.
        if self.active_count > 0 {
            let _ = self.timer.arm(0);
        }
    }
}

/// Whole milliseconds until `deadline`, rounded toward zero but never below
/// 1: zero is the timer's disable signal, and a past deadline must still
/// fire on the next tick rather than starve.
fn delay_ms_until(now: Timestamp, deadline: Timestamp) -> u64 {
    let delay_ms = deadline.saturating_nanos_since(now) / 1_000_000;
    delay_ms.max(1)
}
