//! Task Control Block and the state model it lives in.
//!
//! This module defines the per-task record the rest of the crate schedules,
//! along with the small set of enums ([`TaskState`], [`WaitReason`]) that
//! describe where a task currently sits in its lifecycle. The TCB itself
//! knows nothing about queues: the intrusive `next` link lives here, but
//! walking and ordering queues is [`crate::queue`]'s job.

use crate::mutex::MutexId;
use crate::vm::VmHandle;

/// Ticks per time slice. One hardware tick is 1 ms by convention; the
/// monitor is correct under any tick rate the HAL guarantees monotone.
pub const TIMESLICE_TICK: u8 = 10;

/// Stable index into the task arena owned by [`crate::scheduler::Scheduler`].
///
/// A `TcbRef` is never reused while the TCB it names is live; it is handed
/// back to callers (`create_task`, guest bindings) as the stable handle for a
/// task, and used internally as the intrusive queue link in place of a raw
/// pointer, so the queue manager never has to reason about pointer validity
/// across reallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TcbRef(pub(crate) usize);

impl TcbRef {
    pub(crate) fn index(self) -> usize {
        self.0
    }

    /// Recovers a `TcbRef` previously handed out as a raw index. Used by the
    /// `c-library` FFI surface, which cannot pass a `TcbRef` across the `C`
    /// boundary directly.
    pub fn from_raw(index: usize) -> Self {
        TcbRef(index)
    }

    /// The raw arena index behind this handle, for the `c-library` FFI
    /// surface to pass back across the `C` boundary.
    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Lifecycle state of a task. At most one TCB is `Running` at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not running, VM closed, not on any schedulable queue proper (lives on
    /// the dormant queue so its TCB slot can be reused by `create_task`).
    Dormant,
    /// On the ready queue; a `Running` task is also considered `Ready` for
    /// queue-membership purposes (both live on the ready queue), but is
    /// tracked as a distinct state since only one task may hold it.
    Ready,
    /// Currently executing a VM slice.
    Running,
    /// Blocked until a sleep deadline or a mutex hand-off; see [`WaitReason`].
    Waiting,
    /// Parked by an explicit `suspend_task` call until `resume_task`.
    Suspended,
}

/// Why a `Waiting` task is waiting. Only meaningful when `state == Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Waiting for `wakeup_tick` to equal the tick counter.
    Sleep,
    /// Waiting for a mutex to be handed off to it.
    Mutex,
}

/// The unit of scheduling.
///
/// Every live TCB is on exactly one of the four queues; `state` agrees with
/// which queue it is on. `next` is the intrusive link used by
/// [`crate::queue`] and is only meaningful while the TCB is enqueued — it
/// must be `None` for a detached TCB, which is a precondition `insert`
/// asserts in debug builds.
pub struct Tcb {
    pub state: TaskState,
    /// Base priority set by the creator or by `change_priority`. Lower
    /// numeric value means higher priority.
    pub priority: u8,
    /// Effective ordering key used by the queues. Initialized to `priority`;
    /// a future priority-inheritance extension may let this diverge.
    pub priority_preemption: u8,
    /// Remaining ticks in the current slice. Replenished to
    /// [`TIMESLICE_TICK`] on (re)entry to `Ready`. Only meaningful while
    /// `Ready` or `Running`.
    pub timeslice: u8,
    /// Valid iff `state == Waiting`.
    pub reason: WaitReason,
    /// Valid iff `reason == Sleep`: the tick at which this task wakes.
    pub wakeup_tick: u32,
    /// Valid iff `reason == Mutex`: the mutex being awaited.
    pub mutex: Option<MutexId>,
    /// Opaque handle to this task's VM instance. `Some` iff `state !=
    /// Dormant`; the scheduler closes and clears it on termination.
    pub vm: Option<VmHandle>,
    /// Intrusive queue link; `None` when detached.
    pub(crate) next: Option<TcbRef>,
}

impl Tcb {
    /// A freshly allocated, detached TCB in `Dormant` state with no VM open.
    pub(crate) fn dormant() -> Self {
        Tcb {
            state: TaskState::Dormant,
            priority: 0,
            priority_preemption: 0,
            timeslice: 0,
            reason: WaitReason::Sleep,
            wakeup_tick: 0,
            mutex: None,
            vm: None,
            next: None,
        }
    }

    /// Resets a dormant TCB for reuse by a newly created task, opening it
    /// onto the ready queue with a fresh time slice at the given priority.
    /// Does not touch `vm`; the caller attaches the VM handle separately,
    /// since opening it may fail and the caller needs to report that before
    /// committing the TCB to `Ready`.
    pub(crate) fn reopen(&mut self, priority: u8) {
        debug_assert!(self.next.is_none(), "reopen on an enqueued TCB");
        self.state = TaskState::Ready;
        self.priority = priority;
        self.priority_preemption = priority;
        self.timeslice = TIMESLICE_TICK;
    }

    /// True while this TCB's invariants require an open VM.
    pub(crate) fn is_live(&self) -> bool {
        !matches!(self.state, TaskState::Dormant)
    }
}
