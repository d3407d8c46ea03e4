//! The mutex primitive and its hand-off protocol.
//!
//! A [`Mutex`] has no queue of its own: blocked waiters sit on the scheduler's
//! ordinary waiting queue with `reason == WaitReason::Mutex`, distinguished
//! from sleepers only by that tag and by carrying the mutex's identity in
//! `Tcb::mutex`. `unlock` resolves the next owner directly — by priority
//! order among the waiters tagged for this mutex — and hands ownership to it
//! without ever passing through an intermediate unlocked state a third task
//! could steal.
//!
//! A general mutex registry (allocating, naming, or iterating mutexes by
//! handle) is out of scope here; a `Mutex` is expected to live wherever its
//! owner puts it (statically, or inside a VM engine's own per-VM state), and
//! is identified by its address.

use crate::console;
use crate::hal::Hal;
use crate::scheduler::Scheduler;
use crate::tcb::{TaskState, TcbRef, WaitReason, TIMESLICE_TICK};
use crate::vm::VmEngine;

/// Identity of a [`Mutex`], derived from its address. Two `MutexId`s compare
/// equal iff they were taken from the same `Mutex` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexId(usize);

/// A non-reentrant lock. Ownership transfers directly from the unlocking
/// task to the highest-priority waiter, if any; there is no notion of
/// "unlocked but contended".
///
/// `repr(C)` so the `c-library` feature can hand a guest VM a raw pointer to
/// one and get a stable layout back across the boundary.
#[repr(C)]
pub struct Mutex {
    locked: bool,
    owner: Option<TcbRef>,
}

impl Mutex {
    pub const fn new() -> Self {
        Mutex {
            locked: false,
            owner: None,
        }
    }

    /// This mutex's identity, for tagging a waiting TCB.
    pub fn id(&self) -> MutexId {
        MutexId(self as *const Mutex as usize)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn owner(&self) -> Option<TcbRef> {
        self.owner
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: VmEngine, H: Hal> Scheduler<E, H> {
    /// Locks `mutex` on behalf of `caller`, blocking if it is already held.
    ///
    /// If free, `caller` takes ownership immediately and the call returns
    /// without touching any queue. If held, `caller` is detached from the
    /// ready queue, tagged `Waiting`/`Mutex`, and inserted on the waiting
    /// queue in priority order alongside any sleepers already there — the
    /// two reasons share one queue, distinguished by `reason`.
    pub(crate) fn lock(&mut self, mutex: &mut Mutex, caller: TcbRef) {
        if !mutex.locked {
            mutex.locked = true;
            mutex.owner = Some(caller);
            return;
        }

        let id = mutex.id();
        // `caller`'s own vm handle has to be read before its state flips to
        // `Waiting` below — `request_reschedule` only finds whichever TCB is
        // still tagged `Running`, and that is never the caller once this
        // function parks it, so its own yield-now signal is set directly
        // against its handle instead, the same way `bindings::sleep_ms` does.
        let vm = self.tcb(caller).vm.expect("locking task has no vm");
        self.detach_from_current_queue(caller);
        let tcb = self.tcb_mut(caller);
        tcb.reason = WaitReason::Mutex;
        tcb.mutex = Some(id);
        tcb.state = TaskState::Waiting;
        self.insert_waiting(caller);
        self.engine.preemption_flag(vm).set();
    }

    /// Attempts to lock `mutex` without blocking. Returns `true` iff `caller`
    /// now owns it.
    pub(crate) fn try_lock(&mut self, mutex: &mut Mutex, caller: TcbRef) -> bool {
        if mutex.locked {
            return false;
        }
        mutex.locked = true;
        mutex.owner = Some(caller);
        true
    }

    /// Releases `mutex`, which `caller` must currently own.
    ///
    /// If any task is waiting on this mutex, ownership passes directly to
    /// the highest-priority one (the waiting queue's own ordering already
    /// gives us this — we just scan for the first entry tagged for this
    /// mutex) without the mutex ever reporting unlocked in between; that
    /// waiter is moved straight to the ready queue as `Ready`, not back
    /// through a momentary unlocked-mutex window another task could steal.
    /// If nobody is waiting, the mutex is simply marked free.
    pub(crate) fn unlock(&mut self, mutex: &mut Mutex, caller: TcbRef) {
        debug_assert!(mutex.locked, "unlock: mutex is not locked");
        debug_assert_eq!(
            mutex.owner,
            Some(caller),
            "unlock: caller does not own this mutex"
        );

        let id = mutex.id();
        let next_owner = self.find_mutex_waiter(id);
        match next_owner {
            Some(waiter) => {
                self.detach_from_current_queue(waiter);
                mutex.owner = Some(waiter);
                let tcb = self.tcb_mut(waiter);
                tcb.mutex = None;
                tcb.state = TaskState::Ready;
                tcb.timeslice = TIMESLICE_TICK;
                self.insert_ready(waiter);
                self.request_reschedule();
            }
            None => {
                mutex.locked = false;
                mutex.owner = None;
            }
        }
    }

    /// Scans the waiting queue, in its existing priority order, for the
    /// first task tagged for `id`.
    fn find_mutex_waiter(&self, id: MutexId) -> Option<TcbRef> {
        let mut cur = self.waiting_head();
        while let Some(cur_ref) = cur {
            let tcb = self.tcb(cur_ref);
            if tcb.reason == WaitReason::Mutex && tcb.mutex == Some(id) {
                return Some(cur_ref);
            }
            cur = self.next_link(cur_ref);
        }
        console::trace!("unlock: no task waiting on this mutex");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Scheduler-level hand-off (no intermediate unlocked window, priority
    // ordering among waiters, trylock non-blocking) needs a running
    // `Scheduler` to exercise and is covered by
    // `tests/mutex_and_suspend.rs`; these cover `Mutex` itself, which has no
    // dependency on a scheduler at all.

    #[test]
    fn new_is_unlocked_with_no_owner() {
        let m = Mutex::new();
        assert!(!m.is_locked());
        assert_eq!(m.owner(), None);
    }

    #[test]
    fn default_matches_new() {
        let m = Mutex::default();
        assert!(!m.is_locked());
        assert_eq!(m.owner(), None);
    }

    #[test]
    fn id_is_stable_for_the_same_mutex() {
        let m = Mutex::new();
        assert_eq!(m.id(), m.id());
    }

    #[test]
    fn id_differs_across_distinct_mutexes() {
        let a = Mutex::new();
        let b = Mutex::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn accessors_reflect_locked_field_state() {
        let mut m = Mutex::new();
        let owner = TcbRef(7);
        m.locked = true;
        m.owner = Some(owner);
        assert!(m.is_locked());
        assert_eq!(m.owner(), Some(owner));
    }
}
