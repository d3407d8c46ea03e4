mod common;

#[cfg(all(feature = "rt-tests", feature = "host-sim"))]
mod tests {
    use crate::common::{script, MockEngine, BAD_BYTECODE};
    use vigil_rt::hal::mock::Mock as TestHal;
    use vigil_rt::{RunOutcome, Scheduler, SchedulerError, TaskState};

    fn new_scheduler() -> Scheduler<MockEngine, TestHal> {
        Scheduler::new(MockEngine::new())
    }

    /// A task sleeping for 0 ms wakes on the very next tick: the wakeup
    /// predicate is equality with `tick + 0`, so it fires the first time the
    /// tick handler runs afterward.
    #[test]
    fn sleep_zero_wakes_on_next_tick() {
        let mut sched = new_scheduler();
        let a = sched.create_task(&script(0), None, 128).unwrap();

        let (tcb, vm) = sched.begin_dispatch().unwrap();
        assert_eq!(tcb, a);
        sched.sleep_ms(vm, 0);
        sched.end_dispatch(tcb, vm, RunOutcome::Yielded);
        assert_eq!(sched.state_of(a), TaskState::Waiting);

        sched.tick();
        assert_eq!(sched.state_of(a), TaskState::Ready);
    }

    /// A sleeper wakes at the tick equal to its deadline, not before: at
    /// tick 4 it is still waiting; at tick 5 it is ready, and since it now
    /// outranks whichever lower-priority task is running, that task's
    /// preemption flag is set so the dispatcher reselects promptly. The
    /// sleep is kept shorter than `TIMESLICE_TICK` so B's own slice-expiry
    /// preemption (an unrelated source of the same flag) cannot confound the
    /// assertion.
    #[test]
    fn sleep_wakeup_fires_at_deadline_and_preempts_lower_priority() {
        let mut sched = new_scheduler();
        let a = sched.create_task(&script(0), None, 50).unwrap();
        let b = sched.create_task(&script(0), None, 200).unwrap();

        let (tcb, vm) = sched.begin_dispatch().unwrap();
        assert_eq!(tcb, a);
        sched.sleep_ms(vm, 5);
        sched.end_dispatch(tcb, vm, RunOutcome::Yielded);

        // B is now the only ready task and starts running.
        let (tcb, vm_b) = sched.begin_dispatch().unwrap();
        assert_eq!(tcb, b);

        for _ in 0..4 {
            sched.tick();
        }
        assert_eq!(sched.state_of(a), TaskState::Waiting);
        assert!(!sched.preemption_flag_is_set(vm_b));

        sched.tick();
        assert_eq!(sched.state_of(a), TaskState::Ready);
        assert!(sched.preemption_flag_is_set(vm_b));
    }

    /// Two tasks that both terminate drain every non-dormant queue; `run`
    /// returns `0` once the last one finishes.
    #[test]
    fn run_returns_zero_once_all_tasks_terminate() {
        let mut sched = new_scheduler();
        sched.create_task(&script(3), None, 100).unwrap();
        sched.create_task(&script(5), None, 200).unwrap();

        assert_eq!(sched.run(), 0);
        assert!(sched.is_drained());
    }

    /// A VM load failure reports `LoadFailed` rather than enqueueing a
    /// half-initialized task.
    #[test]
    fn bad_bytecode_reports_load_failed() {
        let mut sched = new_scheduler();
        let err = sched.create_task(BAD_BYTECODE, None, 128).unwrap_err();
        assert_eq!(err, SchedulerError::LoadFailed);
        assert_eq!(sched.task_count(), 1);
        assert_eq!(sched.count_in_state(TaskState::Dormant), 1);
    }

    /// A terminated task's slot is reclaimed by a later `create_task` call
    /// that names it via `reuse`, rather than growing the arena.
    #[test]
    fn terminated_tcb_slot_is_reused() {
        let mut sched = new_scheduler();
        let a = sched.create_task(&script(1), None, 128).unwrap();
        let (tcb, vm) = sched.begin_dispatch().unwrap();
        sched.end_dispatch(tcb, vm, RunOutcome::Terminated);
        assert_eq!(sched.state_of(a), TaskState::Dormant);
        assert_eq!(sched.task_count(), 1);

        let reused = sched.create_task(&script(0), Some(a), 64).unwrap();
        assert_eq!(reused, a);
        assert_eq!(sched.task_count(), 1);
        assert_eq!(sched.state_of(a), TaskState::Ready);
    }
}
