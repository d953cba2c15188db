use std::time::Duration;

use proptest::prelude::*;

use crate::host::ManualTimer;
use crate::scheduler::{EventId, Scheduler};
use cadence_time::{FakeClock, Timestamp};

const MAX_OPS: usize = 96;
const MAX_DEADLINE_MS: u64 = 200;

#[derive(Debug, Clone)]
enum Op {
    Connect,
    /// `target` indexes into the test's list of live ids, modulo its length.
    Schedule { target: usize, deadline_ms: u64 },
    Disarm { target: usize },
    Disconnect { target: usize },
    Fire { advance_ms: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Connect),
        4 => (any::<usize>(), 0..=MAX_DEADLINE_MS)
            .prop_map(|(target, deadline_ms)| Op::Schedule { target, deadline_ms }),
        2 => any::<usize>().prop_map(|target| Op::Disarm { target }),
        2 => any::<usize>().prop_map(|target| Op::Disconnect { target }),
        2 => (0..=20u64).prop_map(|advance_ms| Op::Fire { advance_ms }),
    ]
}

fn pick(ids: &[EventId], target: usize) -> Option<EventId> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[target % ids.len()])
    }
}

proptest! {
    /// Any op sequence leaves the heap ordered, every stored rank in sync
    /// with the slot array, and the partition counts coherent.
    #[test]
    fn random_op_sequences_preserve_invariants(ops in proptest::collection::vec(op_strategy(), 1..MAX_OPS)) {
        let clock = FakeClock::new();
        let timer = ManualTimer::new();
        let mut sched: Scheduler<FakeClock, ManualTimer> =
            Scheduler::new(clock.clone(), timer.clone());
        let mut ids: Vec<EventId> = Vec::new();

        for op in ops {
            match op {
                Op::Connect => {
                    ids.push(sched.connect(|_, _, _| {}).unwrap());
                }
                Op::Schedule { target, deadline_ms } => {
                    if let Some(id) = pick(&ids, target) {
                        sched
                            .schedule(id, Timestamp::from_nanos(deadline_ms * 1_000_000))
                            .unwrap();
                    }
                }
                Op::Disarm { target } => {
                    if let Some(id) = pick(&ids, target) {
                        sched.disarm(id);
                    }
                }
                Op::Disconnect { target } => {
                    if let Some(id) = pick(&ids, target) {
                        prop_assert!(sched.disconnect(id));
                        ids.retain(|&other| other != id);
                    }
                }
                Op::Fire { advance_ms } => {
                    clock.advance(Duration::from_millis(advance_ms));
                    sched.on_timer_fire();
                }
            }
            sched.check_consistency();
            prop_assert_eq!(sched.connected_count(), ids.len());
        }
    }

    /// Draining at a time past every deadline fires callbacks in deadline
    /// order, whatever order they were scheduled in.
    #[test]
    fn full_drain_fires_in_deadline_order(mut deadlines_ms in proptest::collection::vec(1..=MAX_DEADLINE_MS, 1..24)) {
        use std::cell::RefCell;
        use std::rc::Rc;

        let clock = FakeClock::new();
        let timer = ManualTimer::new();
        let mut sched: Scheduler<FakeClock, ManualTimer> =
            Scheduler::new(clock.clone(), timer.clone());

        let fired: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
        for &ms in &deadlines_ms {
            let fired = Rc::clone(&fired);
            let id = sched.connect(move |_, _, _| fired.borrow_mut().push(ms)).unwrap();
            sched.schedule(id, Timestamp::from_nanos(ms * 1_000_000)).unwrap();
        }

        clock.advance(Duration::from_millis(MAX_DEADLINE_MS + 1));
        sched.on_timer_fire();
        sched.check_consistency();

        deadlines_ms.sort_unstable();
        prop_assert_eq!(fired.borrow().clone(), deadlines_ms);
        prop_assert_eq!(sched.armed_count(), 0);
        prop_assert!(timer.is_disabled());
    }
}
