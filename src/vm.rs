//! The external VM engine collaborator.
//!
//! The monitor hosts an arbitrary bytecode interpreter; it never executes
//! guest instructions itself. [`VmEngine`] is the seam: a host application
//! implements it once for whatever interpreter it embeds (a bytecode
//! compiler, a tiny Forth machine, a WASM interpreter — the monitor does not
//! care), and the dispatcher drives it through `open`/`load`/`begin`/`run`/
//! `end`/`close`.
//!
//! [`PreemptionFlag`] is the single-word cooperative signal a running VM
//! samples between its own instructions; the monitor writes it, the VM
//! reads it. No acquire/release ordering is required beyond tearing-freedom,
//! since the VM only samples it between its own instructions, never from
//! another thread.

use core::sync::atomic::{AtomicBool, Ordering};

/// Opaque handle to a VM instance. The monitor never looks inside it; it
/// only threads it through [`VmEngine`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmHandle(pub usize);

/// Outcome of a [`VmEngine::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The VM returned because its preemption flag was set, or the bytecode
    /// unit it ran voluntarily yielded. The task goes back to `Ready`.
    Yielded,
    /// The VM finished its bytecode or hit an unrecoverable error. The task
    /// is torn down and its TCB returns to `Dormant`.
    Terminated,
}

/// Per-VM cooperative signal requesting the VM return to the dispatcher at
/// its next safe point (between instructions).
///
/// A single atomic bool is sufficient: the dispatcher writes it, the VM
/// samples it, and the value cannot tear. This is intentionally not a
/// critical-section-protected field — setting it never needs to exclude the
/// tick handler or guest operations from each other, only to be visible to
/// the VM on its next check.
#[derive(Debug, Default)]
pub struct PreemptionFlag(AtomicBool);

impl PreemptionFlag {
    pub const fn new() -> Self {
        PreemptionFlag(AtomicBool::new(false))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The operations the monitor needs from a hosted bytecode VM engine.
///
/// A host application's engine owns the actual interpreter state; this trait
/// is implemented once against that engine and handed to
/// [`crate::scheduler::Scheduler`] at `init` time.
///
/// Implementations must expose a [`PreemptionFlag`] per `VmHandle` through
/// [`VmEngine::preemption_flag`] — the dispatcher writes to it and the guest
/// bindings read it back to decide when a task should yield.
pub trait VmEngine {
    /// Allocates a new VM instance and returns its handle. Returns `None` on
    /// allocation failure.
    fn open(&mut self) -> Option<VmHandle>;

    /// Loads a bytecode image into an opened VM. Returns `false` on a load
    /// failure (malformed bytecode, size limits, and the like); the caller
    /// is responsible for closing the VM and reporting the failure.
    fn load(&mut self, vm: VmHandle, bytecode: &[u8]) -> bool;

    /// Prepares a loaded VM to begin executing from its entry point. Called
    /// once, before the first `run`.
    fn begin(&mut self, vm: VmHandle);

    /// Executes `vm` until it yields or terminates. This is the only call
    /// that actually runs guest instructions; it must return promptly once
    /// the VM observes its own preemption flag set.
    fn run(&mut self, vm: VmHandle) -> RunOutcome;

    /// Finalizes a VM after its last `run` call returned `Terminated`.
    fn end(&mut self, vm: VmHandle);

    /// Releases all resources associated with `vm`. After this call the
    /// handle must not be reused.
    fn close(&mut self, vm: VmHandle);

    /// Returns the preemption flag associated with `vm`, so the dispatcher
    /// can clear it before a run and the guest bindings can set it to
    /// request an early yield.
    fn preemption_flag(&self, vm: VmHandle) -> &PreemptionFlag;
}
