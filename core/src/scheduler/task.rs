//! Task table and lifecycle: a fixed-size array of kernel tasks, all
//! resident in kernel address space (no user mode, no paging, no MM crate —
//! this kernel schedules kernel threads only).

use core::ffi::{c_int, c_void};
use core::ptr;
use core::sync::atomic::Ordering;

use slopos_lib::string::bytes_as_str;
use slopos_lib::{IrqMutex, klog_debug, klog_info};

pub use super::task_struct::{
    BlockReason, INVALID_PROCESS_ID, INVALID_TASK_ID, MAX_TASKS, TASK_NAME_MAX_LEN,
    TASK_PRIORITY_HIGH, TASK_PRIORITY_IDLE, TASK_PRIORITY_LOW, TASK_PRIORITY_NORMAL,
    TASK_STACK_SIZE, Task, TaskExitReason, TaskExitRecord, TaskFaultReason, TaskStatus,
};
use crate::pcr;

pub type TaskIterateCb = fn(*mut Task, *mut c_void);

struct TaskTable {
    tasks: [Task; MAX_TASKS],
    next_task_id: u32,
    active_count: u32,
}

unsafe impl Send for TaskTable {}

impl TaskTable {
    const fn new() -> Self {
        Self {
            tasks: [const { Task::invalid() }; MAX_TASKS],
            next_task_id: 1,
            active_count: 0,
        }
    }
}

static TASK_TABLE: IrqMutex<TaskTable> = IrqMutex::new(TaskTable::new());

fn with_task_table<R>(f: impl FnOnce(&mut TaskTable) -> R) -> R {
    let mut guard = TASK_TABLE.lock();
    f(&mut guard)
}

pub fn init_task_manager() -> c_int {
    with_task_table(|table| {
        *table = TaskTable::new();
    });
    klog_debug!("SCHED: task manager initialized");
    0
}

/// Find a task by ID, returning null if not present or the slot is no
/// longer live.
pub fn task_find_by_id(task_id: u32) -> *mut Task {
    if task_id == INVALID_TASK_ID {
        return ptr::null_mut();
    }
    with_task_table(|table| {
        for task in table.tasks.iter_mut() {
            if task.task_id == task_id && task.status() != TaskStatus::Invalid {
                return task as *mut Task;
            }
        }
        ptr::null_mut()
    })
}

fn reserve_slot(table: &mut TaskTable) -> Option<(*mut Task, u32)> {
    for task in table.tasks.iter_mut() {
        if task.status() == TaskStatus::Invalid {
            let task_id = table.next_task_id;
            table.next_task_id = table.next_task_id.wrapping_add(1).max(1);
            table.active_count += 1;
            return Some((task as *mut Task, task_id));
        }
    }
    None
}

/// Create a new kernel task. `stack_base`/`stack_size` describe a region
/// owned by the caller for the lifetime of the task (no dynamic allocation
/// in this kernel).
pub fn task_create(
    name: &[u8],
    entry_point: extern "C" fn(*mut c_void) -> !,
    arg: *mut c_void,
    priority: u8,
    stack_base: u64,
    stack_size: u64,
) -> u32 {
    let Some((task_ptr, task_id)) = with_task_table(reserve_slot) else {
        klog_info!("SCHED: task table full, cannot create task");
        return INVALID_TASK_ID;
    };

    let task = unsafe { &mut *task_ptr };
    *task = Task::invalid();
    task.task_id = task_id;
    task.tgid = task_id;
    let copy_len = name.len().min(TASK_NAME_MAX_LEN - 1);
    task.name[..copy_len].copy_from_slice(&name[..copy_len]);
    task.base_priority = priority;
    task.set_current_priority(priority);
    task.time_slice = super::scheduler::DEFAULT_TIME_SLICE_TICKS;
    task.time_slice_remaining = super::scheduler::DEFAULT_TIME_SLICE_TICKS;
    task.entry_point = entry_point as usize as u64;
    task.entry_arg = arg;
    task.stack_base = stack_base;
    task.stack_size = stack_size;
    task.kernel_stack_base = stack_base;
    task.kernel_stack_top = stack_base + stack_size;
    task.kernel_stack_size = stack_size;
    task.creation_time = slopos_lib::kdiag_timestamp();
    task.switch_ctx = super::task_struct::SwitchContext::new_for_task(
        task.entry_point,
        arg as u64,
        task.kernel_stack_top,
        super::switch_asm::task_entry_trampoline as usize as u64,
    );
    task.set_status(TaskStatus::Ready);

    klog_debug!(
        "SCHED: created task {} ({})",
        task_id,
        bytes_as_str(&task.name)
    );
    task_id
}

pub fn task_terminate(task_id: u32) -> c_int {
    let task_ptr = task_find_by_id(task_id);
    if task_ptr.is_null() {
        return -1;
    }
    let task = unsafe { &mut *task_ptr };
    if !task.terminate() {
        return -1;
    }
    super::scheduler::unschedule_task(task_ptr);
    super::sleep::cancel_sleep(task_id);
    super::futex::futex_remove_task(task_ptr);
    with_task_table(|table| table.active_count = table.active_count.saturating_sub(1));
    0
}

pub fn task_get_info(task_id: u32, task_info: *mut *mut Task) -> c_int {
    let task_ptr = task_find_by_id(task_id);
    if task_ptr.is_null() || task_info.is_null() {
        return -1;
    }
    unsafe { *task_info = task_ptr };
    0
}

pub fn task_get_exit_record(task_id: u32, record_out: *mut TaskExitRecord) -> c_int {
    let task_ptr = task_find_by_id(task_id);
    if task_ptr.is_null() || record_out.is_null() {
        return -1;
    }
    let task = unsafe { &*task_ptr };
    unsafe {
        *record_out = TaskExitRecord {
            task_id,
            exit_reason: task.exit_reason,
            fault_reason: task.fault_reason,
            exit_code: task.exit_code,
        };
    }
    0
}

pub fn task_set_state(task_id: u32, new_status: TaskStatus) -> c_int {
    let task_ptr = task_find_by_id(task_id);
    if task_ptr.is_null() {
        return -1;
    }
    if unsafe { (*task_ptr).try_transition_to(new_status) } {
        0
    } else {
        -1
    }
}

pub fn task_set_state_with_reason(task_id: u32, new_status: TaskStatus, reason: BlockReason) -> c_int {
    let task_ptr = task_find_by_id(task_id);
    if task_ptr.is_null() {
        return -1;
    }
    let task = unsafe { &mut *task_ptr };
    if !task.try_transition_to(new_status) {
        return -1;
    }
    task.block_reason = reason;
    0
}

pub fn get_task_stats(total_tasks: *mut u32, active_tasks: *mut u32, context_switches: *mut u64) {
    with_task_table(|table| {
        if !total_tasks.is_null() {
            unsafe { *total_tasks = MAX_TASKS as u32 };
        }
        if !active_tasks.is_null() {
            unsafe { *active_tasks = table.active_count };
        }
    });
    if !context_switches.is_null() {
        let total: u64 = (0..pcr::get_pcr_count())
            .filter_map(pcr::get_pcr)
            .map(|p| p.context_switches.load(Ordering::Relaxed))
            .sum();
        unsafe { *context_switches = total };
    }
}

pub fn task_record_context_switch(_from: *mut Task, to: *mut Task, timestamp: u64) {
    if !to.is_null() {
        unsafe { (*to).last_run_timestamp = timestamp };
    }
}

pub fn task_record_yield(task: *mut Task) {
    if !task.is_null() {
        unsafe { (*task).yield_count = (*task).yield_count.wrapping_add(1) };
    }
}

pub fn task_state_to_string(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Invalid => "invalid",
        TaskStatus::Ready => "ready",
        TaskStatus::Running => "running",
        TaskStatus::Blocked => "blocked",
        TaskStatus::Terminated => "terminated",
    }
}

pub fn task_iterate_active(callback: TaskIterateCb, context: *mut c_void) {
    with_task_table(|table| {
        for task in table.tasks.iter_mut() {
            if task.status() != TaskStatus::Invalid {
                callback(task as *mut Task, context);
            }
        }
    });
}

pub fn task_get_current_id() -> u32 {
    let task = task_get_current();
    if task.is_null() {
        INVALID_TASK_ID
    } else {
        unsafe { (*task).task_id }
    }
}

pub fn task_get_current() -> *mut Task {
    if !pcr::is_pcr_initialized() {
        return ptr::null_mut();
    }
    unsafe { pcr::current_pcr() }
        .current_task
        .load(Ordering::Acquire) as *mut Task
}

pub fn task_set_current(task: *mut Task) {
    if !pcr::is_pcr_initialized() {
        return;
    }
    unsafe { pcr::current_pcr() }
        .current_task
        .store(task as *mut (), Ordering::Release);
}

pub fn task_get_state(task: *const Task) -> TaskStatus {
    if task.is_null() {
        TaskStatus::Invalid
    } else {
        unsafe { (*task).status() }
    }
}

pub fn task_is_ready(task: *const Task) -> bool {
    !task.is_null() && unsafe { (*task).is_ready() }
}

pub fn task_is_running(task: *const Task) -> bool {
    !task.is_null() && unsafe { (*task).is_running() }
}

pub fn task_is_blocked(task: *const Task) -> bool {
    !task.is_null() && unsafe { (*task).is_blocked() }
}

pub fn task_is_terminated(task: *const Task) -> bool {
    task.is_null() || unsafe { (*task).is_terminated() }
}

pub fn task_is_invalid(task: *const Task) -> bool {
    task.is_null() || unsafe { (*task).status() == TaskStatus::Invalid }
}
