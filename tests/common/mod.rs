//! A scripted `VmEngine` and a host-sim `Hal` shared by the integration
//! tests. Neither needs any process-wide state: each test builds its own
//! `Scheduler<MockEngine, TestHal>` from scratch.

#![cfg(all(feature = "rt-tests", feature = "host-sim"))]

use vigil_rt::hal::mock::Mock as TestHal;
use vigil_rt::{PreemptionFlag, RunOutcome, VmEngine, VmHandle};

/// Bytecode understood by [`MockEngine`]: four little-endian bytes giving the
/// number of `run` calls before the VM terminates, or `0` for a VM that
/// yields forever and must be driven to termination by the test itself (by
/// suspending, sleeping, or simply never calling it again).
pub fn script(run_calls_before_terminate: u32) -> [u8; 4] {
    run_calls_before_terminate.to_le_bytes()
}

/// Bytecode that fails to load, for exercising `SchedulerError::LoadFailed`.
pub const BAD_BYTECODE: &[u8] = &[];

pub struct MockEngine {
    flags: Vec<PreemptionFlag>,
    units_left: Vec<Option<u32>>,
    closed: Vec<bool>,
}

#[allow(dead_code)]
impl MockEngine {
    pub fn new() -> Self {
        MockEngine {
            flags: Vec::new(),
            units_left: Vec::new(),
            closed: Vec::new(),
        }
    }

    pub fn is_closed(&self, vm: VmHandle) -> bool {
        self.closed[vm.0]
    }
}

impl VmEngine for MockEngine {
    fn open(&mut self) -> Option<VmHandle> {
        let idx = self.flags.len();
        self.flags.push(PreemptionFlag::new());
        self.units_left.push(None);
        self.closed.push(false);
        Some(VmHandle(idx))
    }

    fn load(&mut self, vm: VmHandle, bytecode: &[u8]) -> bool {
        if bytecode.len() < 4 {
            return false;
        }
        let units = u32::from_le_bytes(bytecode[0..4].try_into().unwrap());
        self.units_left[vm.0] = if units == 0 { None } else { Some(units) };
        true
    }

    fn begin(&mut self, _vm: VmHandle) {}

    fn run(&mut self, vm: VmHandle) -> RunOutcome {
        match self.units_left[vm.0] {
            None => RunOutcome::Yielded,
            Some(1) => {
                self.units_left[vm.0] = Some(0);
                RunOutcome::Terminated
            }
            Some(n) => {
                self.units_left[vm.0] = Some(n - 1);
                RunOutcome::Yielded
            }
        }
    }

    fn end(&mut self, _vm: VmHandle) {}

    fn close(&mut self, vm: VmHandle) {
        self.closed[vm.0] = true;
    }

    fn preemption_flag(&self, vm: VmHandle) -> &PreemptionFlag {
        &self.flags[vm.0]
    }
}
