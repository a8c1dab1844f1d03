//! Kernel-thread convenience wrappers over the raw task table.
//!
//! Kthreads draw from a static pool of fixed-size stacks, handed out once
//! and never reclaimed: this kernel never allocates a stack dynamically,
//! and its kthreads are long-lived daemons (the IRQ-proxy worker, boot-time
//! init threads) rather than a churning workload.

use core::ffi::{c_char, c_int, c_void};
use core::sync::atomic::{AtomicUsize, Ordering};

use slopos_lib::klog_info;
use slopos_lib::string;

use super::scheduler;
use super::scheduler::task_wait_for;
use super::task::{
    INVALID_TASK_ID, MAX_TASKS, TASK_PRIORITY_NORMAL, TASK_STACK_SIZE, task_create,
    task_find_by_id,
};

pub type KthreadId = u32;
pub type TaskEntry = extern "C" fn(*mut c_void) -> !;

#[repr(align(16))]
struct KthreadStack([u8; TASK_STACK_SIZE as usize]);

static mut KTHREAD_STACKS: [KthreadStack; MAX_TASKS] =
    [const { KthreadStack([0; TASK_STACK_SIZE as usize]) }; MAX_TASKS];
static NEXT_STACK_SLOT: AtomicUsize = AtomicUsize::new(0);

fn reserve_stack() -> Option<(u64, u64)> {
    let slot = NEXT_STACK_SLOT.fetch_add(1, Ordering::Relaxed);
    if slot >= MAX_TASKS {
        return None;
    }
    let base = unsafe { KTHREAD_STACKS[slot].0.as_ptr() as u64 };
    Some((base, TASK_STACK_SIZE))
}

pub fn kthread_spawn(
    name: *const c_char,
    entry_point: Option<TaskEntry>,
    arg: *mut c_void,
) -> KthreadId {
    kthread_spawn_ex(name, entry_point, arg, TASK_PRIORITY_NORMAL)
}

pub fn kthread_spawn_ex(
    name: *const c_char,
    entry_point: Option<TaskEntry>,
    arg: *mut c_void,
    priority: u8,
) -> KthreadId {
    let Some(entry) = entry_point else {
        klog_info!("kthread_spawn_ex: invalid parameters");
        return INVALID_TASK_ID;
    };
    if name.is_null() {
        klog_info!("kthread_spawn_ex: invalid parameters");
        return INVALID_TASK_ID;
    }

    let Some((stack_base, stack_size)) = reserve_stack() else {
        klog_info!("kthread_spawn_ex: stack pool exhausted");
        return INVALID_TASK_ID;
    };

    let name_str = unsafe { string::cstr_to_str(name) };
    let id = task_create(
        name_str.as_bytes(),
        entry,
        arg,
        priority,
        stack_base,
        stack_size,
    );

    if id == INVALID_TASK_ID {
        klog_info!("kthread_spawn_ex: failed to create thread '{}'", name_str);
        return id;
    }

    let _ = scheduler::schedule_task(task_find_by_id(id));
    id
}

pub fn kthread_yield() {
    scheduler::r#yield();
}

pub fn kthread_join(thread_id: KthreadId) -> c_int {
    task_wait_for(thread_id)
}

pub fn kthread_exit() -> ! {
    super::ffi_boundary::scheduler_task_exit();
}
