//! The scheduler: the TCB arena, the four state queues, the tick counter,
//! and the operations that move a task between queues.
//!
//! `Scheduler<E, H>` is generic over the hosted [`VmEngine`] and the
//! [`Hal`] backend rather than boxing either — both are known at the
//! application's top level, and a bare-metal target would rather pay that
//! cost at monomorphization time than carry a vtable per call.
//!
//! The dispatch loop itself ([`Scheduler::run`]) lives in a sibling module
//! selected at compile time: [`timer_driven`] by default, or
//! [`synthetic_tick`] under the `synthetic-tick` feature. Both share
//! everything defined here.

use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::console;
use crate::error::SchedulerError;
use crate::hal::Hal;
use crate::queue;
use crate::tcb::{TaskState, Tcb, TcbRef, TIMESLICE_TICK};
use crate::vm::{VmEngine, VmHandle};

cfg_if::cfg_if! {
    if #[cfg(feature = "synthetic-tick")] {
        mod synthetic_tick;
    } else {
        mod timer_driven;
    }
}

/// Result of one [`Scheduler::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The ready queue was empty; the HAL was asked to idle once.
    Idle,
    /// `vm` ran one unit of work and returned `outcome` to the dispatcher.
    Ran { vm: VmHandle, outcome: crate::vm::RunOutcome },
}

/// The monitor's entire scheduling state for one hosted engine.
///
/// This type holds no global state of its own — the host decides where it
/// lives. On a target where the tick timer ISR and `run`'s mainline loop
/// genuinely run concurrently, the host must place the `Scheduler` behind
/// something like a `critical_section::Mutex<RefCell<Scheduler<E, H>>>>`
/// static and have the ISR reach `tick()` through a short `borrow_mut`
/// rather than holding any reference across `begin_dispatch`/`end_dispatch`'s
/// `engine.run()` call — that call is the one place interrupts are meant to
/// stay enabled.
pub struct Scheduler<E: VmEngine, H: Hal> {
    tasks: Vec<Tcb>,
    dormant: Option<TcbRef>,
    ready: Option<TcbRef>,
    waiting: Option<TcbRef>,
    suspended: Option<TcbRef>,
    tick: u32,
    // Visible crate-wide (not just to this module and its `timer_driven`/
    // `synthetic_tick` children): `bindings` and `mutex` both need to poke a
    // specific VM's preemption flag directly by handle, which is a case
    // `request_reschedule`'s "whichever TCB is Running" search can't cover —
    // the caller of a guest-facing operation is often about to stop being
    // `Running` in the very same critical section.
    pub(crate) engine: E,
    _hal: PhantomData<H>,
}

impl<E: VmEngine, H: Hal> Scheduler<E, H> {
    /// An empty scheduler hosting `engine`. No tasks exist until
    /// `create_task` is called.
    pub const fn new(engine: E) -> Self {
        Scheduler {
            tasks: Vec::new(),
            dormant: None,
            ready: None,
            waiting: None,
            suspended: None,
            tick: 0,
            engine,
            _hal: PhantomData,
        }
    }

    /// Runs the HAL's one-time setup. Call once before `run`.
    pub fn init(&self) {
        H::init();
    }

    /// Creates a task from `bytecode` at `priority` (lower value runs
    /// first), returning its stable handle.
    ///
    /// If `reuse` names a `Dormant` TCB, its slot is reclaimed instead of
    /// growing the arena; passing the handle of a TCB that is not currently
    /// `Dormant` is a precondition violation and reported as
    /// [`SchedulerError::AlreadyEnqueued`] rather than corrupting whichever
    /// queue that TCB is actually on.
    pub fn create_task(
        &mut self,
        bytecode: &[u8],
        reuse: Option<TcbRef>,
        priority: u8,
    ) -> Result<TcbRef, SchedulerError> {
        H::disable_irq();
        let result = self.create_task_locked(bytecode, reuse, priority);
        H::enable_irq();
        result
    }

    fn create_task_locked(
        &mut self,
        bytecode: &[u8],
        reuse: Option<TcbRef>,
        priority: u8,
    ) -> Result<TcbRef, SchedulerError> {
        // `tcb_ref` is left linked onto the dormant queue for the whole of
        // this function, exactly as any other dormant TCB would be; it is
        // only unlinked once `open`/`load` have both succeeded, immediately
        // before being handed to the ready queue below. This way a failure
        // midway through (out of memory, bad bytecode) leaves the slot where
        // invariant 1 says a dormant TCB belongs, instead of orphaning it off
        // every queue where a later `reuse` call would find nothing to
        // unlink.
        let tcb_ref = match reuse {
            Some(r) => {
                if !matches!(self.tasks[r.index()].state, TaskState::Dormant) {
                    return Err(SchedulerError::AlreadyEnqueued);
                }
                r
            }
            None => {
                self.tasks.push(Tcb::dormant());
                let r = TcbRef(self.tasks.len() - 1);
                queue::insert(&mut self.tasks, &mut self.dormant, r);
                r
            }
        };

        let vm = self.engine.open().ok_or(SchedulerError::OutOfMemory)?;
        if !self.engine.load(vm, bytecode) {
            self.engine.close(vm);
            return Err(SchedulerError::LoadFailed);
        }
        self.engine.begin(vm);

        queue::remove(&mut self.tasks, &mut self.dormant, tcb_ref);
        let tcb = &mut self.tasks[tcb_ref.index()];
        tcb.reopen(priority);
        tcb.vm = Some(vm);
        queue::insert(&mut self.tasks, &mut self.ready, tcb_ref);
        Ok(tcb_ref)
    }

    /// Advances the tick counter by one and performs the bookkeeping that
    /// must happen every tick: decrementing the running task's time slice
    /// (setting its preemption flag if it just expired) and waking any
    /// sleepers whose deadline has arrived.
    ///
    /// Called from the tick timer interrupt in the default build; called
    /// inline by the dispatcher itself under `synthetic-tick`.
    pub fn tick(&mut self) {
        H::disable_irq();
        self.tick = self.tick.wrapping_add(1);

        if let Some(head) = self.ready {
            if matches!(self.tasks[head.index()].state, TaskState::Running) {
                let tcb = &mut self.tasks[head.index()];
                if tcb.timeslice > 0 {
                    tcb.timeslice -= 1;
                    if tcb.timeslice == 0 {
                        let vm = tcb.vm.expect("running task has no vm");
                        self.engine.preemption_flag(vm).set();
                    }
                }
            }
        }

        let mut woke_any = false;
        let mut cur = self.waiting;
        while let Some(cur_ref) = cur {
            let next = self.tasks[cur_ref.index()].next;
            let wakes = {
                let tcb = &self.tasks[cur_ref.index()];
                tcb.reason == crate::tcb::WaitReason::Sleep && tcb.wakeup_tick == self.tick
            };
            if wakes {
                queue::remove(&mut self.tasks, &mut self.waiting, cur_ref);
                let tcb = &mut self.tasks[cur_ref.index()];
                tcb.timeslice = TIMESLICE_TICK;
                tcb.state = TaskState::Ready;
                queue::insert(&mut self.tasks, &mut self.ready, cur_ref);
                woke_any = true;
            }
            cur = next;
        }

        if woke_any {
            self.request_reschedule();
        }
        H::enable_irq();
    }

    /// `true` once every task has terminated: the ready, waiting, and
    /// suspended queues are all empty. Dormant TCBs (reclaimable slots)
    /// don't count against this — a fully drained monitor may still be
    /// holding arena capacity for reuse.
    pub fn is_drained(&self) -> bool {
        self.ready.is_none() && self.waiting.is_none() && self.suspended.is_none()
    }

    pub(crate) fn tcb(&self, t: TcbRef) -> &Tcb {
        &self.tasks[t.index()]
    }

    pub(crate) fn tcb_mut(&mut self, t: TcbRef) -> &mut Tcb {
        &mut self.tasks[t.index()]
    }

    pub(crate) fn next_link(&self, t: TcbRef) -> Option<TcbRef> {
        self.tasks[t.index()].next
    }

    pub(crate) fn current_tick_internal(&self) -> u32 {
        self.tick
    }

    pub(crate) fn waiting_head(&self) -> Option<TcbRef> {
        self.waiting
    }

    pub(crate) fn insert_ready(&mut self, t: TcbRef) {
        queue::insert(&mut self.tasks, &mut self.ready, t);
    }

    pub(crate) fn insert_waiting(&mut self, t: TcbRef) {
        queue::insert(&mut self.tasks, &mut self.waiting, t);
    }

    pub(crate) fn insert_suspended(&mut self, t: TcbRef) {
        queue::insert(&mut self.tasks, &mut self.suspended, t);
    }

    /// Detaches `t` from whichever of the four queues its current `state`
    /// says it is on.
    pub(crate) fn detach_from_current_queue(&mut self, t: TcbRef) {
        let head = match self.tasks[t.index()].state {
            TaskState::Dormant => &mut self.dormant,
            TaskState::Ready | TaskState::Running => &mut self.ready,
            TaskState::Waiting => &mut self.waiting,
            TaskState::Suspended => &mut self.suspended,
        };
        queue::remove(&mut self.tasks, head, t);
    }

    /// Resolves a hosted VM back to the TCB running it: the fast path checks
    /// the ready queue's head (where the currently running task always sits
    /// when one exists), falling back to a full scan of the ready queue for
    /// safety. `None` if `vm` names no currently-ready task — the guest
    /// bindings treat that as a no-op rather than trust a stale handle.
    pub(crate) fn resolve_running(&self, vm: VmHandle) -> Option<TcbRef> {
        if let Some(head) = self.ready {
            if self.tasks[head.index()].vm == Some(vm) {
                return Some(head);
            }
        }
        let mut cur = self.ready;
        while let Some(cur_ref) = cur {
            if self.tasks[cur_ref.index()].vm == Some(vm) {
                return Some(cur_ref);
            }
            cur = self.tasks[cur_ref.index()].next;
        }
        console::warn!("resolve_running: vm handle not found on the ready queue");
        None
    }

    /// Sets the preemption flag of whichever task is currently `Running`, if
    /// any. Used whenever a queue change might make a higher-priority task
    /// ready and the currently running one needs to yield sooner than its
    /// own time slice would otherwise force.
    ///
    /// This is exactly the situation in which the running task is *not* the
    /// ready queue's head any more: a newly-readied task that outranks it
    /// was just inserted ahead of it by priority, which is precisely why a
    /// reschedule needs requesting. So unlike [`Self::resolve_running`],
    /// there is no head fast-path here — it would miss the running task in
    /// the one case this function exists to handle — and the scan walks the
    /// whole queue.
    pub(crate) fn request_reschedule(&mut self) {
        let mut cur = self.ready;
        while let Some(cur_ref) = cur {
            let tcb = &self.tasks[cur_ref.index()];
            if matches!(tcb.state, TaskState::Running) {
                if let Some(vm) = tcb.vm {
                    self.engine.preemption_flag(vm).set();
                }
                return;
            }
            cur = tcb.next;
        }
    }
}

#[cfg(feature = "rt-tests")]
impl<E: VmEngine, H: Hal> Scheduler<E, H> {
    /// Total number of TCBs in the arena, live or dormant.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of TCBs currently in `state`.
    pub fn count_in_state(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }

    /// The current tick counter, for tests that need to reason about
    /// wakeup deadlines directly.
    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    /// The current state of `t`, for tests that need to assert on a
    /// specific task rather than an aggregate count.
    pub fn state_of(&self, t: TcbRef) -> TaskState {
        self.tasks[t.index()].state
    }

    /// Whether `vm`'s preemption flag is currently set, for tests that
    /// assert a reschedule was requested without driving a full dispatch.
    pub fn preemption_flag_is_set(&self, vm: VmHandle) -> bool {
        self.engine.preemption_flag(vm).is_set()
    }
}
