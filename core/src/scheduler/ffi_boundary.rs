//! FFI boundary layer for the scheduler.
//!
//! Only functions that need `extern "C"` linkage belong here. Context
//! switching itself is the naked-asm `switch_registers`/`task_entry_trampoline`
//! pair in `switch_asm.rs`; the only thing still called by name from that
//! trampoline is `scheduler_task_exit`, below.

#![allow(unsafe_op_in_unsafe_fn)]

/// Called by `task_entry_trampoline` when a task's entry function returns
/// instead of calling `task_terminate` itself.
#[unsafe(no_mangle)]
pub extern "C" fn scheduler_task_exit() -> ! {
    super::scheduler::scheduler_task_exit_impl()
}
