//! Guest-facing operations: the surface a hosted VM calls into to sleep,
//! yield, change its own priority, suspend or resume a task, and take or
//! release a mutex.
//!
//! Every operation here resolves the calling VM back to its TCB first (the
//! caller must currently be the running task, hence findable on the ready
//! queue — see [`Scheduler::resolve_running`]) and is a defensive no-op,
//! logged and otherwise ignored, if that resolution fails; a guest handing
//! back a stale or foreign handle must not be able to corrupt scheduler
//! state. `resume_task` is the one exception: it names the task to resume
//! explicitly, since a suspended task cannot be the one calling it.

use crate::console;
use crate::hal::Hal;
use crate::mutex::Mutex;
use crate::scheduler::Scheduler;
use crate::tcb::{TaskState, TcbRef, WaitReason, TIMESLICE_TICK};
use crate::vm::{VmEngine, VmHandle};

/// Stable handle to a task, returned by `create_task` and accepted by
/// [`Scheduler::resume_task`].
pub type TcbHandle = TcbRef;

impl<E: VmEngine, H: Hal> Scheduler<E, H> {
    /// Puts the calling task to sleep for `ms` milliseconds, measured from
    /// the tick counter at the time of the call.
    pub fn sleep_ms(&mut self, vm: VmHandle, ms: u32) {
        H::disable_irq();
        if let Some(caller) = self.resolve_running(vm) {
            let wakeup = self.current_tick_internal().wrapping_add(ms);
            self.detach_from_current_queue(caller);
            let tcb = self.tcb_mut(caller);
            tcb.timeslice = 0;
            tcb.state = TaskState::Waiting;
            tcb.reason = WaitReason::Sleep;
            tcb.wakeup_tick = wakeup;
            self.insert_waiting(caller);
            self.engine.preemption_flag(vm).set();
        } else {
            console::warn!("sleep_ms: calling vm is not the running task");
        }
        H::enable_irq();
    }

    /// Puts the calling task to sleep for `secs` seconds. Equivalent to
    /// `sleep_ms(vm, secs * 1000)`.
    pub fn sleep(&mut self, vm: VmHandle, secs: u32) {
        self.sleep_ms(vm, secs.saturating_mul(1000));
    }

    /// Ends the calling task's current time slice early without blocking
    /// it: it stays `Ready`, but its slice is exhausted so the dispatcher
    /// rotates it behind same-priority peers on its next return.
    pub fn relinquish(&mut self, vm: VmHandle) {
        H::disable_irq();
        if let Some(caller) = self.resolve_running(vm) {
            self.tcb_mut(caller).timeslice = 0;
            self.engine.preemption_flag(vm).set();
        } else {
            console::warn!("relinquish: calling vm is not the running task");
        }
        H::enable_irq();
    }

    /// Changes the calling task's priority to `priority`. Takes effect on
    /// its next return to the dispatcher, which re-sorts it into the ready
    /// queue at the new priority.
    pub fn change_priority(&mut self, vm: VmHandle, priority: u8) {
        H::disable_irq();
        if let Some(caller) = self.resolve_running(vm) {
            let tcb = self.tcb_mut(caller);
            tcb.priority = priority;
            tcb.priority_preemption = priority;
            tcb.timeslice = 0;
            self.engine.preemption_flag(vm).set();
        } else {
            console::warn!("change_priority: calling vm is not the running task");
        }
        H::enable_irq();
    }

    /// Parks the calling task until some other task calls `resume_task`
    /// naming its handle.
    pub fn suspend_task(&mut self, vm: VmHandle) {
        H::disable_irq();
        if let Some(caller) = self.resolve_running(vm) {
            self.detach_from_current_queue(caller);
            self.tcb_mut(caller).state = TaskState::Suspended;
            self.insert_suspended(caller);
            self.engine.preemption_flag(vm).set();
        } else {
            console::warn!("suspend_task: calling vm is not the running task");
        }
        H::enable_irq();
    }

    /// Resumes `target`, which must currently be `Suspended`, moving it back
    /// to the ready queue. Also requests a reschedule of whichever task is
    /// currently running, since the newly ready task may outrank it.
    pub fn resume_task(&mut self, target: TcbHandle) {
        H::disable_irq();
        if matches!(self.tcb(target).state, TaskState::Suspended) {
            self.detach_from_current_queue(target);
            let tcb = self.tcb_mut(target);
            tcb.state = TaskState::Ready;
            tcb.timeslice = TIMESLICE_TICK;
            self.insert_ready(target);
            self.request_reschedule();
        } else {
            console::warn!("resume_task: target is not suspended");
        }
        H::enable_irq();
    }

    /// Locks `mutex` on behalf of the calling VM, blocking it if the mutex
    /// is already held.
    pub fn mutex_lock(&mut self, mutex: &mut Mutex, vm: VmHandle) {
        H::disable_irq();
        if let Some(caller) = self.resolve_running(vm) {
            self.lock(mutex, caller);
        } else {
            console::warn!("mutex_lock: calling vm is not the running task");
        }
        H::enable_irq();
    }

    /// Attempts to lock `mutex` on behalf of the calling VM without
    /// blocking. Returns `true` iff it now owns the mutex.
    pub fn mutex_try_lock(&mut self, mutex: &mut Mutex, vm: VmHandle) -> bool {
        H::disable_irq();
        let result = match self.resolve_running(vm) {
            Some(caller) => self.try_lock(mutex, caller),
            None => {
                console::warn!("mutex_try_lock: calling vm is not the running task");
                false
            }
        };
        H::enable_irq();
        result
    }

    /// Unlocks `mutex`, which the calling VM must currently own.
    pub fn mutex_unlock(&mut self, mutex: &mut Mutex, vm: VmHandle) {
        H::disable_irq();
        if let Some(caller) = self.resolve_running(vm) {
            self.unlock(mutex, caller);
        } else {
            console::warn!("mutex_unlock: calling vm is not the running task");
        }
        H::enable_irq();
    }
}
