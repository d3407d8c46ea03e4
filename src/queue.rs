//! Priority-ordered singly-linked queues over the TCB arena.
//!
//! Every one of the four task-state queues (dormant/ready/waiting/suspended)
//! is a `Option<TcbRef>` head plus the intrusive `next` link stored inside
//! each [`Tcb`]. `insert` and `remove` are the only two operations; both
//! assume the caller already holds the critical section (the scheduler's
//! job, not this module's) and neither ever blocks.
//!
//! Complexity is O(n) in the length of the target queue. `n` is small by
//! construction — one task per hosted VM, bounded by available memory — so
//! a linked list beats a heap here: no reallocation, no shifting, and
//! removal by identity is a pointer-sized comparison.

use crate::tcb::{Tcb, TcbRef};

/// Inserts `tcb` into the queue headed by `head`, ordered ascending by
/// `priority_preemption`. Placed immediately before the first existing
/// element whose key is strictly greater — i.e. after all equal-priority
/// elements — which yields strict priority order with FIFO tie-breaking
/// among arrivals at the same priority.
///
/// `tcb` must be detached (`next == None`) before this call; debug builds
/// assert it.
pub(crate) fn insert(arena: &mut [Tcb], head: &mut Option<TcbRef>, tcb: TcbRef) {
    debug_assert!(
        arena[tcb.index()].next.is_none(),
        "insert: tcb must be detached"
    );
    let key = arena[tcb.index()].priority_preemption;

    let mut prev: Option<TcbRef> = None;
    let mut cur = *head;
    while let Some(cur_ref) = cur {
        if arena[cur_ref.index()].priority_preemption > key {
            break;
        }
        prev = Some(cur_ref);
        cur = arena[cur_ref.index()].next;
    }

    arena[tcb.index()].next = cur;
    match prev {
        Some(prev_ref) => arena[prev_ref.index()].next = Some(tcb),
        None => *head = Some(tcb),
    }
}

/// Removes `tcb` from the queue headed by `head` by scanning from the head
/// for pointer (index) equality and unlinking it. No-op-safe to call only
/// when `tcb` is actually linked into this queue; callers always know which
/// queue a TCB is on from its `state`.
pub(crate) fn remove(arena: &mut [Tcb], head: &mut Option<TcbRef>, tcb: TcbRef) {
    let mut prev: Option<TcbRef> = None;
    let mut cur = *head;
    while let Some(cur_ref) = cur {
        if cur_ref == tcb {
            let next = arena[cur_ref.index()].next;
            match prev {
                Some(prev_ref) => arena[prev_ref.index()].next = next,
                None => *head = next,
            }
            arena[cur_ref.index()].next = None;
            return;
        }
        prev = Some(cur_ref);
        cur = arena[cur_ref.index()].next;
    }
    debug_assert!(false, "remove: tcb not found on the expected queue");
}

/// Returns `true` iff the queue headed by `head` is empty.
pub(crate) fn is_empty(head: Option<TcbRef>) -> bool {
    head.is_none()
}
