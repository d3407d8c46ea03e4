//! Alternate, timer-less dispatch loop, selected by the `synthetic-tick`
//! feature for targets with no hardware tick source to wire up.
//!
//! Rather than waiting for a real interrupt to call [`Scheduler::tick`],
//! `end_dispatch` pre-arms each VM's preemption flag before every `run` call
//! — so the engine returns after one unit of its own work — and calls
//! `tick` itself once per unit, synthesizing the same time accounting the
//! default loop gets from a real timer. Observable task ordering is
//! identical; only the source of time is different.

use crate::hal::Hal;
use crate::queue;
use crate::tcb::{TaskState, TcbRef, TIMESLICE_TICK};
use crate::vm::{RunOutcome, VmEngine, VmHandle};

use super::{Scheduler, StepOutcome};

impl<E: VmEngine, H: Hal> Scheduler<E, H> {
    /// Runs hosted tasks until every one of them has terminated, then
    /// returns `0`.
    pub fn run(&mut self) -> i32 {
        loop {
            self.step();
            if self.is_drained() {
                return 0;
            }
        }
    }

    /// Performs one unit of dispatch, synthesizing a tick call for the time
    /// it consumes. See the module documentation for why this is equivalent
    /// to the ISR-driven loop's `step`.
    pub fn step(&mut self) -> StepOutcome {
        let Some((tcb, vm)) = self.begin_dispatch() else {
            H::idle_cpu();
            return StepOutcome::Idle;
        };
        let outcome = self.engine.run(vm);
        self.end_dispatch(tcb, vm, outcome);
        StepOutcome::Ran { vm, outcome }
    }

    /// Transitions the ready head to `Running` and pre-arms its preemption
    /// flag (rather than clearing it), so the engine returns after exactly
    /// one unit of work. Returns `None` if nothing is ready.
    pub fn begin_dispatch(&mut self) -> Option<(TcbRef, VmHandle)> {
        let head = self.ready?;
        H::disable_irq();
        self.tasks[head.index()].state = TaskState::Running;
        let vm = self.tasks[head.index()].vm.expect("ready task has no vm");
        self.engine.preemption_flag(vm).set();
        H::enable_irq();
        Some((head, vm))
    }

    /// Reconciles `tcb`'s queue membership after its VM call returned
    /// `outcome`, synthesizing one tick of elapsed time first if the task is
    /// still live — matching a real tick interrupt landing once per unit of
    /// VM work in this build.
    pub fn end_dispatch(&mut self, tcb: TcbRef, vm: VmHandle, outcome: RunOutcome) {
        match outcome {
            RunOutcome::Terminated => {
                H::disable_irq();
                queue::remove(&mut self.tasks, &mut self.ready, tcb);
                self.tasks[tcb.index()].state = TaskState::Dormant;
                queue::insert(&mut self.tasks, &mut self.dormant, tcb);
                H::enable_irq();

                self.engine.end(vm);
                self.engine.close(vm);
                self.tasks[tcb.index()].vm = None;
            }
            RunOutcome::Yielded => {
                // Still `Running` at this point unless a guest binding
                // already moved it elsewhere during this unit of work;
                // `tick` only acts on a `Running` head.
                self.tick();

                H::disable_irq();
                if matches!(self.tasks[tcb.index()].state, TaskState::Running) {
                    self.tasks[tcb.index()].state = TaskState::Ready;
                    if self.tasks[tcb.index()].timeslice == 0 {
                        queue::remove(&mut self.tasks, &mut self.ready, tcb);
                        self.tasks[tcb.index()].timeslice = TIMESLICE_TICK;
                        queue::insert(&mut self.tasks, &mut self.ready, tcb);
                    }
                }
                H::enable_irq();
            }
        }
    }
}
