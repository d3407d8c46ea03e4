//! A cooperative-preemptive real-time task monitor for hosting one or more
//! independent bytecode VM instances on a bare-metal target with no
//! underlying OS.
//!
//! The monitor never executes guest bytecode itself; it drives an
//! application-supplied [`vm::VmEngine`] through open/load/run/close and
//! relies on that engine to sample a per-task [`vm::PreemptionFlag`] between
//! its own instructions. Hosting this monitor means implementing
//! [`vm::VmEngine`] for your interpreter and [`hal::Hal`] for your target,
//! then driving [`scheduler::Scheduler`] from your own `main`.
//!
//! This crate provides no global allocator: it uses `alloc` for the task
//! arena, and the host binary is responsible for installing one suited to
//! its target.

#![no_std]

extern crate alloc;

pub mod bindings;
#[cfg(feature = "c-library")]
pub mod c_api;
pub mod console;
pub mod error;
pub mod hal;
pub mod mutex;
pub mod queue;
pub mod scheduler;
pub mod tcb;
pub mod vm;

pub use bindings::TcbHandle;
pub use error::SchedulerError;
pub use mutex::{Mutex, MutexId};
pub use scheduler::{Scheduler, StepOutcome};
pub use tcb::{TaskState, TcbRef, TIMESLICE_TICK};
pub use vm::{PreemptionFlag, RunOutcome, VmEngine, VmHandle};
