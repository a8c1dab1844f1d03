//! Idle task and the boot-time handoff into the scheduler proper.
//!
//! One idle task per core (two cores, never hotplugged, never brought back
//! down): each just spins in `hlt` until `schedule()` finds higher-priority
//! work. There is no separate per-core scheduler loop thread to hand-roll —
//! the idle task is an ordinary, lowest-priority member of the one global
//! ready queue, and entering the scheduler on a core is just dispatching
//! into it for the first time.

use core::ffi::c_int;
use core::ptr;

use slopos_lib::klog_info;

use super::scheduler::{schedule, set_scheduler_enabled};
use super::task::{
    INVALID_TASK_ID, TASK_PRIORITY_IDLE, TASK_STACK_SIZE, task_create, task_find_by_id,
    task_set_current,
};
use crate::pcr::MAX_CPUS;

#[repr(align(16))]
struct IdleStack([u8; TASK_STACK_SIZE as usize]);

static mut IDLE_STACKS: [IdleStack; MAX_CPUS] =
    [const { IdleStack([0; TASK_STACK_SIZE as usize]) }; MAX_CPUS];
static mut IDLE_TASK_IDS: [u32; MAX_CPUS] = [INVALID_TASK_ID; MAX_CPUS];

extern "C" fn idle_loop(_arg: *mut core::ffi::c_void) -> ! {
    loop {
        unsafe { core::arch::asm!("sti; hlt; cli", options(nomem, nostack)) };
        schedule();
    }
}

pub fn create_idle_task_for_cpu(cpu_id: usize) -> c_int {
    if cpu_id >= MAX_CPUS {
        return -1;
    }
    let stack_base = unsafe { IDLE_STACKS[cpu_id].0.as_ptr() as u64 };
    let id = task_create(
        b"idle",
        idle_loop,
        ptr::null_mut(),
        TASK_PRIORITY_IDLE,
        stack_base,
        TASK_STACK_SIZE,
    );
    if id == INVALID_TASK_ID {
        return -1;
    }
    unsafe { IDLE_TASK_IDS[cpu_id] = id };
    0
}

pub fn create_idle_task() -> c_int {
    create_idle_task_for_cpu(0)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum IdleStackResolveError {
    MissingIdleTask,
    MissingKernelStack,
}

pub(crate) fn resolve_idle_stack_for_cpu(
    cpu_id: usize,
) -> Result<(*mut super::task_struct::Task, u64), IdleStackResolveError> {
    let idle_id = if cpu_id < MAX_CPUS {
        unsafe { IDLE_TASK_IDS[cpu_id] }
    } else {
        INVALID_TASK_ID
    };
    let idle_task = task_find_by_id(idle_id);
    if idle_task.is_null() {
        return Err(IdleStackResolveError::MissingIdleTask);
    }
    let stack_top = unsafe { (*idle_task).kernel_stack_top };
    if stack_top == 0 {
        return Err(IdleStackResolveError::MissingKernelStack);
    }
    Ok((idle_task, stack_top))
}

/// Mark this core's scheduler enabled and dispatch into its idle task for
/// the first time. Never returns.
pub fn enter_scheduler(cpu_id: usize) -> ! {
    set_scheduler_enabled(true);
    slopos_lib::mark_cpu_online(cpu_id);
    klog_info!("SCHED: CPU {} scheduler online", cpu_id);

    let (idle_task, _stack_top) = match resolve_idle_stack_for_cpu(cpu_id) {
        Ok(values) => values,
        Err(IdleStackResolveError::MissingIdleTask) => {
            klog_info!("SCHED: CPU {} has no idle task, halting", cpu_id);
            loop {
                unsafe { core::arch::asm!("cli; hlt", options(nomem, nostack)) };
            }
        }
        Err(IdleStackResolveError::MissingKernelStack) => {
            klog_info!(
                "SCHED: CPU {} idle task has no kernel stack, halting",
                cpu_id
            );
            loop {
                unsafe { core::arch::asm!("cli; hlt", options(nomem, nostack)) };
            }
        }
    };

    task_set_current(idle_task);
    unsafe { (*idle_task).mark_running() };
    schedule();

    // schedule() keeps switching among ready tasks; if it ever returns here
    // (nothing else is runnable and we're back in our own idle context)
    // there is nothing left to do but wait for the next interrupt.
    loop {
        unsafe { core::arch::asm!("sti; hlt; cli", options(nomem, nostack)) };
    }
}
