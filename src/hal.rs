//! Hardware abstraction the scheduler needs and nothing more: a way to keep
//! interrupts out of a short critical section, and a way to idle the core
//! when there is no ready task.
//!
//! `disable_irq`/`enable_irq` have default bodies built on the
//! [`critical_section`] crate so a target only has to provide one by
//! selecting a `critical-section` backend (its own HAL crate, or
//! `critical-section`'s `std` feature for host builds) rather than
//! reimplementing masking itself. The pairing is used non-nested throughout
//! this crate, matching the restore-state-free default that
//! `critical_section` assumes when no alternate `restore-state-*` feature is
//! selected.

pub trait Hal {
    /// One-time setup before the scheduler runs (clock gating, peripheral
    /// enable, whatever the target needs before its first `idle_cpu`).
    fn init();

    /// Put the core to sleep until the next interrupt. Called by the
    /// dispatcher when the ready queue is empty; must return on any
    /// interrupt, including the tick timer, so the dispatcher can re-check.
    fn idle_cpu();

    /// Masks interrupts. Must be paired with a following `enable_irq` before
    /// another `disable_irq`; this crate never nests the pair.
    fn disable_irq() {
        // SAFETY: matched by `enable_irq` below before any other critical
        // section begins.
        unsafe {
            critical_section::acquire();
        }
    }

    /// Unmasks interrupts previously masked by `disable_irq`.
    fn enable_irq() {
        // SAFETY: releases exactly the critical section `disable_irq`
        // acquired immediately prior.
        unsafe {
            critical_section::release(());
        }
    }
}

/// Host-runnable backend used by this crate's own test suite. Requires the
/// consuming binary to select a `critical_section` implementation — the
/// `std` one, enabled here as a dev-dependency, is sufficient for a
/// single-threaded test harness.
#[cfg(feature = "host-sim")]
pub mod mock {
    use super::Hal;

    pub struct Mock;

    impl Hal for Mock {
        fn init() {}

        fn idle_cpu() {
            core::hint::spin_loop();
        }
    }
}

/// Cortex-M backend. `idle_cpu` issues `wfi`, which blocks until the next
/// interrupt (including the tick timer) without busy-waiting.
#[cfg(target_arch = "arm")]
pub mod cortex_m_backend {
    use super::Hal;

    pub struct CortexM;

    impl Hal for CortexM {
        fn init() {}

        fn idle_cpu() {
            cortex_m::asm::wfi();
        }
    }
}
