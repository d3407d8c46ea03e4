mod common;

#[cfg(all(feature = "rt-tests", feature = "host-sim", feature = "synthetic-tick"))]
mod tests {
    use crate::common::{script, MockEngine};
    use vigil_rt::hal::mock::Mock as TestHal;
    use vigil_rt::{RunOutcome, Scheduler, TaskState, TIMESLICE_TICK};

    fn new_scheduler() -> Scheduler<MockEngine, TestHal> {
        Scheduler::new(MockEngine::new())
    }

    /// Replays `tests/round_robin.rs`'s scenario against the timer-less
    /// build: each `begin_dispatch`/`end_dispatch(Yielded)` pair is one unit
    /// of synthesized time rather than a tick the test drives by hand, so a
    /// full slice is `TIMESLICE_TICK` dispatch cycles rather than
    /// `TIMESLICE_TICK` explicit `tick()` calls.
    #[test]
    fn round_robin_within_a_priority() {
        let mut sched = new_scheduler();
        let a = sched.create_task(&script(0), None, 128).unwrap();
        let b = sched.create_task(&script(0), None, 128).unwrap();

        for _ in 0..TIMESLICE_TICK {
            let (tcb, vm) = sched.begin_dispatch().expect("a task is ready");
            assert_eq!(tcb, a, "A keeps the head until its synthesized slice runs out");
            sched.end_dispatch(tcb, vm, RunOutcome::Yielded);
        }

        // A's slice is spent, so it was requeued behind B: B runs next, for
        // a full slice of its own.
        for _ in 0..TIMESLICE_TICK {
            let (tcb, vm) = sched.begin_dispatch().expect("a task is ready");
            assert_eq!(tcb, b, "B keeps the head until its synthesized slice runs out");
            sched.end_dispatch(tcb, vm, RunOutcome::Yielded);
        }

        // And back to A.
        let (tcb, _) = sched.begin_dispatch().expect("a task is ready");
        assert_eq!(tcb, a);
    }

    /// A task that yields well within its synthesized slice is not
    /// requeued: it stays at the head and is dispatched again immediately,
    /// with no `tick()` call needed from the test itself.
    #[test]
    fn yielding_early_keeps_head_position() {
        let mut sched = new_scheduler();
        let a = sched.create_task(&script(0), None, 128).unwrap();
        let _b = sched.create_task(&script(0), None, 128).unwrap();

        let (tcb, vm) = sched.begin_dispatch().expect("a task is ready");
        sched.end_dispatch(tcb, vm, RunOutcome::Yielded);

        let (tcb, _) = sched.begin_dispatch().expect("a task is ready");
        assert_eq!(tcb, a);
    }

    /// A higher-priority task (smaller numeric value) runs exclusively while
    /// it has work to do, under the synthesized clock exactly as under the
    /// default dispatcher.
    #[test]
    fn higher_priority_runs_exclusively() {
        let mut sched = new_scheduler();
        let a = sched.create_task(&script(0), None, 100).unwrap();
        let _b = sched.create_task(&script(0), None, 200).unwrap();

        for _ in 0..50 {
            let (tcb, vm) = sched.begin_dispatch().expect("a task is ready");
            assert_eq!(tcb, a, "B must not run while A is ready");
            sched.end_dispatch(tcb, vm, RunOutcome::Yielded);
        }
    }

    /// Once the high-priority task sleeps, the lower-priority one takes over
    /// immediately, even though `end_dispatch` synthesizes one tick of its
    /// own on the way out.
    #[test]
    fn lower_priority_runs_once_higher_sleeps() {
        let mut sched = new_scheduler();
        let a = sched.create_task(&script(0), None, 100).unwrap();
        let b = sched.create_task(&script(0), None, 200).unwrap();

        let (tcb, vm) = sched.begin_dispatch().unwrap();
        assert_eq!(tcb, a);
        sched.sleep_ms(vm, 5);
        sched.end_dispatch(tcb, vm, RunOutcome::Yielded);
        assert_eq!(sched.state_of(a), TaskState::Waiting);

        let (tcb, _) = sched.begin_dispatch().expect("b is ready");
        assert_eq!(tcb, b);
    }

    /// A task that changes its own priority is re-sorted into the ready
    /// queue at the new key on its next return to the dispatcher.
    #[test]
    fn change_priority_reorders_on_next_yield() {
        let mut sched = new_scheduler();
        let a = sched.create_task(&script(0), None, 200).unwrap();
        let b = sched.create_task(&script(0), None, 100).unwrap();

        // B is highest priority and runs first.
        let (tcb, vm) = sched.begin_dispatch().unwrap();
        assert_eq!(tcb, b);
        sched.change_priority(vm, 255);
        sched.end_dispatch(tcb, vm, RunOutcome::Yielded);

        // A now outranks the demoted B.
        let (tcb, _) = sched.begin_dispatch().unwrap();
        assert_eq!(tcb, a);
    }

    /// `begin_dispatch` pre-arms the VM's preemption flag rather than
    /// clearing it, since the mock engine is expected to return after this
    /// one synthesized unit regardless; the flag is set the whole time a
    /// task is dispatched in this build.
    #[test]
    fn begin_dispatch_pre_arms_the_preemption_flag() {
        let mut sched = new_scheduler();
        sched.create_task(&script(0), None, 128).unwrap();

        let (_, vm) = sched.begin_dispatch().expect("a task is ready");
        assert!(sched.preemption_flag_is_set(vm));
    }
}
