//! Default dispatch loop: the tick counter advances from a real interrupt
//! source the application wires to [`Scheduler::tick`], independently of
//! this loop.
//!
//! `step` is `begin_dispatch` plus `end_dispatch` around a single
//! `engine.run` call. They are split out because that call is the one place
//! in the dispatcher where interrupts are deliberately left enabled —
//! exactly the window in which a real tick interrupt fires — and splitting
//! it lets a host (or a test standing in for one) drive that window itself
//! instead of only ever getting it bundled inside `step`.

use crate::hal::Hal;
use crate::queue;
use crate::tcb::{TaskState, TcbRef, TIMESLICE_TICK};
use crate::vm::{RunOutcome, VmEngine, VmHandle};

use super::{Scheduler, StepOutcome};

impl<E: VmEngine, H: Hal> Scheduler<E, H> {
    /// Runs hosted tasks until every one of them has terminated, then
    /// returns `0`. Never returns while any task is ready, waiting, or
    /// suspended.
    pub fn run(&mut self) -> i32 {
        loop {
            self.step();
            if self.is_drained() {
                return 0;
            }
        }
    }

    /// Performs one unit of dispatch: if the ready queue is empty, idles the
    /// core once and returns; otherwise runs the ready head until it yields
    /// or terminates and reconciles its queue membership accordingly.
    pub fn step(&mut self) -> StepOutcome {
        let Some((tcb, vm)) = self.begin_dispatch() else {
            H::idle_cpu();
            return StepOutcome::Idle;
        };
        let outcome = self.engine.run(vm);
        self.end_dispatch(tcb, vm, outcome);
        StepOutcome::Ran { vm, outcome }
    }

    /// Transitions the ready head to `Running` and clears its preemption
    /// flag, returning its handle — or `None` if nothing is ready. Interrupts
    /// remain enabled for as long as the caller waits to call `end_dispatch`;
    /// a real tick interrupt is expected to land in that window.
    pub fn begin_dispatch(&mut self) -> Option<(TcbRef, VmHandle)> {
        let head = self.ready?;
        H::disable_irq();
        self.tasks[head.index()].state = TaskState::Running;
        let vm = self.tasks[head.index()].vm.expect("ready task has no vm");
        self.engine.preemption_flag(vm).clear();
        H::enable_irq();
        Some((head, vm))
    }

    /// Reconciles `tcb`'s queue membership after its VM call returned
    /// `outcome`. Must be called with the handle pair `begin_dispatch` just
    /// returned.
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
