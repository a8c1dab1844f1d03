//! Ordered boot-sequence steps issued by the platform boot code, plus the
//! cross-core reschedule doorbell used by the priority-preemption rule
//! (§4.3.5: a wake on one core that raises the ready set's top priority
//! above what the other core is running must interrupt it promptly).

use slopos_lib::klog_info;

use super::runtime::{create_idle_task, create_idle_task_for_cpu};
use super::scheduler::{get_scheduler_stats, init_scheduler, set_scheduler_enabled};
use super::sleep::reset_sleep_queue;

pub fn stop_scheduler() {
    set_scheduler_enabled(false);
}

pub fn scheduler_shutdown() {
    set_scheduler_enabled(false);
    reset_sleep_queue();
}

pub fn boot_step_task_manager_init() -> i32 {
    crate::task::init_task_manager()
}

pub fn boot_step_scheduler_init() -> i32 {
    init_scheduler()
}

pub fn boot_step_idle_task() -> i32 {
    create_idle_task()
}

pub fn init_scheduler_for_ap(cpu_id: usize) {
    if create_idle_task_for_cpu(cpu_id) != 0 {
        klog_info!(
            "SCHED: Warning - failed to create idle task for CPU {}",
            cpu_id
        );
    }
}

pub fn get_percpu_scheduler_stats(
    _cpu_id: usize,
    switches: *mut u64,
    yields: *mut u64,
    ready_tasks: *mut u32,
) {
    get_scheduler_stats(switches, yields, ready_tasks, core::ptr::null_mut());
}

/// Nudge `target_cpu` to reschedule now instead of at its next timer tick.
/// A no-op if the target is this core.
pub fn send_reschedule_ipi(target_cpu: usize) {
    let current_cpu = slopos_lib::get_current_cpu();
    if target_cpu == current_cpu {
        return;
    }
    crate::pcr::send_ipi_to_cpu(target_cpu);
}
