//! extern "C" guest-binding surface for a non-Rust bytecode host, gated by
//! the `c-library` feature.
//!
//! One thin `#[no_mangle] extern "C" fn` wrapper per guest operation,
//! forwarding straight through to the matching [`Scheduler`] method. Since
//! [`Scheduler`] is generic over the hosted [`VmEngine`] and [`Hal`], there is
//! no one fixed set of `extern "C"` symbols this crate can emit ahead of time
//! for an arbitrary host. The functions below are generic (and therefore not
//! callable from `C` directly); [`crate::declare_c_api`] generates the
//! concrete `extern "C"` wrappers for one host's chosen `VmEngine`/`Hal`
//! pair.
//!
//! These wrappers add no locking of their own beyond what each `Scheduler`
//! method already does internally — placing the returned pointer behind
//! whatever interrupt-safe static the target needs is the host's job, the
//! same division of responsibility [`crate::scheduler::Scheduler`]'s own
//! docs describe.

use alloc::boxed::Box;

use crate::hal::Hal;
use crate::mutex::Mutex;
use crate::scheduler::Scheduler;
use crate::tcb::TcbRef;
use crate::vm::{VmEngine, VmHandle};

/// Heap-allocates a `Scheduler` hosting `engine` and hands the C caller an
/// owning raw pointer. Paired with [`destroy`].
pub fn create<E: VmEngine, H: Hal>(engine: E) -> *mut Scheduler<E, H> {
    Box::into_raw(Box::new(Scheduler::new(engine)))
}

/// Reclaims a pointer handed out by [`create`].
///
/// # Safety
/// `ptr` must have come from [`create`] and must not be used again after
/// this call.
pub unsafe fn destroy<E: VmEngine, H: Hal>(ptr: *mut Scheduler<E, H>) {
    drop(unsafe { Box::from_raw(ptr) });
}

/// # Safety
/// `ptr` must be a live pointer from [`create`].
pub unsafe fn tick<E: VmEngine, H: Hal>(ptr: *mut Scheduler<E, H>) {
    unsafe { (*ptr).tick() };
}

/// # Safety
/// `ptr` must be a live pointer from [`create`].
pub unsafe fn run<E: VmEngine, H: Hal>(ptr: *mut Scheduler<E, H>) -> i32 {
    unsafe { (*ptr).run() }
}

/// Returns the new task's raw handle, or `-1` on allocation failure, load
/// failure, or a `reuse` precondition violation — the three
/// [`crate::error::SchedulerError`] kinds collapse to one negative sentinel
/// at the `C` boundary, matching `run`'s own negative-means-error
/// convention.
///
/// # Safety
/// `ptr` must be a live pointer from [`create`]; `bytecode` must point to
/// `len` readable bytes.
pub unsafe fn create_task<E: VmEngine, H: Hal>(
    ptr: *mut Scheduler<E, H>,
    bytecode: *const u8,
    len: usize,
    priority: u8,
) -> i32 {
    let slice = unsafe { core::slice::from_raw_parts(bytecode, len) };
    match unsafe { (*ptr).create_task(slice, None, priority) } {
        Ok(tcb) => tcb.as_raw() as i32,
        Err(_) => -1,
    }
}

/// # Safety
/// `ptr` must be a live pointer from [`create`].
pub unsafe fn sleep_ms<E: VmEngine, H: Hal>(ptr: *mut Scheduler<E, H>, vm: usize, ms: u32) {
    unsafe { (*ptr).sleep_ms(VmHandle(vm), ms) };
}

/// # Safety
/// `ptr` must be a live pointer from [`create`].
pub unsafe fn relinquish<E: VmEngine, H: Hal>(ptr: *mut Scheduler<E, H>, vm: usize) {
    unsafe { (*ptr).relinquish(VmHandle(vm)) };
}

/// # Safety
/// `ptr` must be a live pointer from [`create`].
pub unsafe fn change_priority<E: VmEngine, H: Hal>(
    ptr: *mut Scheduler<E, H>,
    vm: usize,
    priority: u8,
) {
    unsafe { (*ptr).change_priority(VmHandle(vm), priority) };
}

/// # Safety
/// `ptr` must be a live pointer from [`create`].
pub unsafe fn suspend_task<E: VmEngine, H: Hal>(ptr: *mut Scheduler<E, H>, vm: usize) {
    unsafe { (*ptr).suspend_task(VmHandle(vm)) };
}

/// # Safety
/// `ptr` must be a live pointer from [`create`]; `target` must be a handle
/// previously returned by [`create_task`] on this same scheduler.
pub unsafe fn resume_task<E: VmEngine, H: Hal>(ptr: *mut Scheduler<E, H>, target: usize) {
    unsafe { (*ptr).resume_task(TcbRef::from_raw(target)) };
}

/// # Safety
/// `ptr` must be a live pointer from [`create`]; `mutex` must point to a
/// live `Mutex`.
pub unsafe fn mutex_lock<E: VmEngine, H: Hal>(
    ptr: *mut Scheduler<E, H>,
    mutex: *mut Mutex,
    vm: usize,
) {
    unsafe { (*ptr).mutex_lock(&mut *mutex, VmHandle(vm)) };
}

/// # Safety
/// `ptr` must be a live pointer from [`create`]; `mutex` must point to a
/// live `Mutex`.
pub unsafe fn mutex_try_lock<E: VmEngine, H: Hal>(
    ptr: *mut Scheduler<E, H>,
    mutex: *mut Mutex,
    vm: usize,
) -> bool {
    unsafe { (*ptr).mutex_try_lock(&mut *mutex, VmHandle(vm)) }
}

/// # Safety
/// `ptr` must be a live pointer from [`create`]; `mutex` must point to a
/// live `Mutex` currently owned by the task behind `vm`.
pub unsafe fn mutex_unlock<E: VmEngine, H: Hal>(
    ptr: *mut Scheduler<E, H>,
    mutex: *mut Mutex,
    vm: usize,
) {
    unsafe { (*ptr).mutex_unlock(&mut *mutex, VmHandle(vm)) };
}

/// Generates the `#[no_mangle] extern "C"` wrappers around this module's
/// generic helpers for one concrete `Scheduler<$engine, $hal>`. Invoke once
/// per host binary, at the call site that knows its own `VmEngine` and `Hal`
/// types:
///
/// ```ignore
/// vigil_rt::declare_c_api!(MyVmEngine, MyHal);
/// ```
///
/// which emits `vigil_create`, `vigil_destroy`, `vigil_tick`, `vigil_run`,
/// `vigil_create_task`, and one wrapper per guest binding in
/// [`crate::bindings`].
#[macro_export]
macro_rules! declare_c_api {
    ($engine:ty, $hal:ty) => {
        #[no_mangle]
        pub extern "C" fn vigil_create(engine: $engine) -> *mut $crate::Scheduler<$engine, $hal> {
            $crate::c_api::create::<$engine, $hal>(engine)
        }

        /// # Safety
        /// `ptr` must have come from `vigil_create` and not been destroyed.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_destroy(ptr: *mut $crate::Scheduler<$engine, $hal>) {
            unsafe { $crate::c_api::destroy(ptr) }
        }

        /// # Safety
        /// `ptr` must be live.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_tick(ptr: *mut $crate::Scheduler<$engine, $hal>) {
            unsafe { $crate::c_api::tick(ptr) }
        }

        /// # Safety
        /// `ptr` must be live.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_run(ptr: *mut $crate::Scheduler<$engine, $hal>) -> i32 {
            unsafe { $crate::c_api::run(ptr) }
        }

        /// # Safety
        /// `ptr` must be live; `bytecode` must point to `len` readable bytes.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_create_task(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            bytecode: *const u8,
            len: usize,
            priority: u8,
        ) -> i32 {
            unsafe { $crate::c_api::create_task(ptr, bytecode, len, priority) }
        }

        /// # Safety
        /// `ptr` must be live.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_sleep_ms(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            vm: usize,
            ms: u32,
        ) {
            unsafe { $crate::c_api::sleep_ms(ptr, vm, ms) }
        }

        /// # Safety
        /// `ptr` must be live.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_relinquish(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            vm: usize,
        ) {
            unsafe { $crate::c_api::relinquish(ptr, vm) }
        }

        /// # Safety
        /// `ptr` must be live.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_change_priority(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            vm: usize,
            priority: u8,
        ) {
            unsafe { $crate::c_api::change_priority(ptr, vm, priority) }
        }

        /// # Safety
        /// `ptr` must be live.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_suspend_task(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            vm: usize,
        ) {
            unsafe { $crate::c_api::suspend_task(ptr, vm) }
        }

        /// # Safety
        /// `ptr` must be live; `target` must be a handle `vigil_create_task`
        /// previously returned on this same scheduler.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_resume_task(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            target: usize,
        ) {
            unsafe { $crate::c_api::resume_task(ptr, target) }
        }

        /// # Safety
        /// `ptr` and `mutex` must both be live.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_mutex_lock(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            mutex: *mut $crate::Mutex,
            vm: usize,
        ) {
            unsafe { $crate::c_api::mutex_lock(ptr, mutex, vm) }
        }

        /// # Safety
        /// `ptr` and `mutex` must both be live.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_mutex_try_lock(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            mutex: *mut $crate::Mutex,
            vm: usize,
        ) -> bool {
            unsafe { $crate::c_api::mutex_try_lock(ptr, mutex, vm) }
        }

        /// # Safety
        /// `ptr` and `mutex` must both be live, and `mutex` must currently be
        /// owned by the task behind `vm`.
        #[no_mangle]
        pub unsafe extern "C" fn vigil_mutex_unlock(
            ptr: *mut $crate::Scheduler<$engine, $hal>,
            mutex: *mut $crate::Mutex,
            vm: usize,
        ) {
            unsafe { $crate::c_api::mutex_unlock(ptr, mutex, vm) }
        }
    };
}
