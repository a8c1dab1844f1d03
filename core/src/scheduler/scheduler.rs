//! The scheduler: one ready queue, one ticket spinlock, two cores.
//!
//! There used to be one run queue per core with a work-stealing balancer;
//! on a two-core, non-hotpluggable target that machinery buys nothing but
//! lock-ordering complexity, so this is a single global queue behind one
//! [`IrqMutex`], matching `scheduler_spin_lock`/`scheduler_spin_unlock`
//! guarding one `struct scheduler *scheduler` in the original.

use core::ffi::c_int;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use slopos_abi::error::{ECANCELED, EINVAL, ESRCH};
use slopos_abi::task::BlockReason;
use slopos_lib::preempt::PreemptGuard;
use slopos_lib::{IrqMutex, klog_debug, klog_info};

use super::per_cpu::ReadyQueue;
use super::switch_asm::switch_registers;
use super::task::{task_find_by_id, task_get_current, task_record_context_switch, task_record_yield, task_set_current, task_terminate};
use super::task_struct::{SwitchContext, Task, TaskStatus};
use crate::pcr;
use crate::platform;

/// Default number of ticks a task runs before a same-priority neighbor gets
/// a turn (§4.3.2 round robin at equal priority). Reset on every task
/// change; under strict-priority competition it never reaches zero because
/// a higher-priority arrival preempts first.
pub const DEFAULT_TIME_SLICE_TICKS: u64 = 10;

pub(super) struct SchedulerState {
    pub ready: ReadyQueue,
    /// Nesting counter for `scheduler_lock`/`scheduler_unlock` (§4.3.6):
    /// negative means "no preemption even if requested", independent of
    /// the per-core `PreemptGuard` used around the dispatch path itself.
    lock_depth: i32,
    pub total_switches: u64,
    pub total_yields: u64,
    pub schedule_calls: u64,
}

impl SchedulerState {
    const fn new() -> Self {
        Self {
            ready: ReadyQueue::new(),
            lock_depth: 0,
            total_switches: 0,
            total_yields: 0,
            schedule_calls: 0,
        }
    }
}

static SCHED: IrqMutex<SchedulerState> = IrqMutex::new(SchedulerState::new());
static SCHEDULING_ACTIVE: AtomicBool = AtomicBool::new(false);
static TICKS: AtomicU64 = AtomicU64::new(0);

pub(super) fn with_sched<R>(f: impl FnOnce(&mut SchedulerState) -> R) -> R {
    let mut guard = SCHED.lock();
    f(&mut guard)
}

pub fn is_scheduling_active() -> bool {
    SCHEDULING_ACTIVE.load(Ordering::Acquire)
}

pub fn set_scheduler_enabled(enabled: bool) {
    SCHEDULING_ACTIVE.store(enabled, Ordering::Release);
}

pub fn scheduler_is_enabled() -> bool {
    is_scheduling_active()
}

pub fn current_tick() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

pub fn init_scheduler() -> c_int {
    *SCHED.lock() = SchedulerState::new();
    TICKS.store(0, Ordering::Relaxed);
    klog_debug!("SCHED: scheduler initialized");
    0
}

// ---------------------------------------------------------------------------
// scheduler_lock / scheduler_unlock / critical sections (§4.3.6)
// ---------------------------------------------------------------------------

/// Disable preemption even across an otherwise-pending reschedule. Nestable.
pub fn scheduler_lock() {
    with_sched(|s| s.lock_depth -= 1);
}

pub fn scheduler_unlock() {
    with_sched(|s| s.lock_depth += 1);
}

fn preemption_locked() -> bool {
    with_sched(|s| s.lock_depth < 0)
}

pub fn scheduler_set_preemption_enabled(enabled: bool) {
    if enabled {
        scheduler_unlock();
    } else {
        scheduler_lock();
    }
}

pub fn scheduler_is_preemption_enabled() -> bool {
    !preemption_locked()
}

// ---------------------------------------------------------------------------
// Current task / ready queue plumbing
// ---------------------------------------------------------------------------

pub fn scheduler_get_current_task() -> *mut Task {
    task_get_current()
}

pub fn clear_scheduler_current_task() {
    task_set_current(ptr::null_mut());
}

/// Make `task` ready and insert it into the global queue at its current
/// (possibly boosted) priority. Safe to call on an already-ready task.
pub fn schedule_task(task: *mut Task) -> c_int {
    if task.is_null() {
        return EINVAL;
    }
    let _ = unsafe { (*task).mark_ready() };
    with_sched(|s| unsafe { s.ready.push(task) });
    kick_other_core_if_preempted(unsafe { (*task).current_priority() });
    0
}

/// Pull `task` out of the ready queue if present (e.g. it is about to block
/// or be administratively suspended). Returns whether it was enqueued.
pub fn unschedule_task(task: *mut Task) -> bool {
    if task.is_null() {
        return false;
    }
    with_sched(|s| s.ready.remove(task))
}

/// Re-seat an already-enqueued task after a priority-inheritance boost or
/// unboost. No-op if it is not currently on the ready queue (e.g. it is
/// running or blocked — its new priority takes effect next time it is
/// pushed).
pub fn reprioritize_task(task: *mut Task) {
    if task.is_null() {
        return;
    }
    let reseated = with_sched(|s| s.ready.reprioritize(task));
    if reseated {
        kick_other_core_if_preempted(unsafe { (*task).current_priority() });
    }
}

fn ready_peek_priority(core: usize) -> Option<u8> {
    with_sched(|s| {
        let head = s.ready.peek(core);
        if head.is_null() {
            None
        } else {
            Some(unsafe { (*head).current_priority() })
        }
    })
}

/// `pub(crate)` rather than private so tests can directly exercise
/// core-aware dispatch without duplicating the locking.
pub(crate) fn pop_next_ready(core: usize) -> *mut Task {
    with_sched(|s| s.ready.pop(core))
}

/// A task just became ready (or was reprioritized) at `new_priority` on this
/// core. If some *other* core's currently running task has a strictly lower
/// priority, nudge it to reschedule now rather than wait for its own next
/// timer tick (§4.3.5's prompt cross-core preemption rule).
fn kick_other_core_if_preempted(new_priority: u8) {
    let this_core = pcr::current_cpu_id();
    for other_core in 0..slopos_lib::MAX_CPUS {
        if other_core == this_core {
            continue;
        }
        let running = match slopos_lib::pcr::get_pcr(other_core) {
            Some(p) => p.current_task.load(Ordering::Acquire) as *mut Task,
            None => continue,
        };
        if running.is_null() {
            continue;
        }
        let running_priority = unsafe { (*running).current_priority() };
        if new_priority < running_priority {
            super::lifecycle::send_reschedule_ipi(other_core);
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn switch_to(prev: *mut Task, next: *mut Task) {
    if prev == next {
        if !next.is_null() {
            unsafe { (*next).mark_running() };
        }
        return;
    }

    unsafe {
        (*next).mark_running();
        (*next).time_slice_remaining = (*next).time_slice;
    }
    task_set_current(next);
    with_sched(|s| s.total_switches += 1);

    let now = platform::timer_ticks();
    task_record_context_switch(prev, next, now);
    if pcr::is_pcr_initialized() {
        unsafe { pcr::current_pcr() }
            .context_switches
            .fetch_add(1, Ordering::Relaxed);
    }

    let prev_ctx: *mut SwitchContext = if prev.is_null() {
        ptr::null_mut()
    } else {
        unsafe { &mut (*prev).switch_ctx }
    };
    let next_ctx: *const SwitchContext = unsafe { &(*next).switch_ctx };

    // SAFETY: both tasks are live (prev was just running or is null for the
    // first switch off the boot stack; next was just popped from the ready
    // queue and marked Running), and this core holds no scheduler lock
    // across the switch itself.
    unsafe { switch_registers(prev_ctx, next_ctx) };
}

/// Core dispatch entry point: requeue the current task if it is still
/// runnable, pick the next-highest-priority ready task, and switch to it.
/// If nothing is ready, the caller's own task (already marked Running) is
/// re-selected.
pub fn schedule() {
    if preemption_locked() {
        PreemptGuard::set_reschedule_pending();
        return;
    }

    let _guard = PreemptGuard::new();
    with_sched(|s| s.schedule_calls += 1);

    super::futex::drain_deferred_wakes();

    let this_core = pcr::current_cpu_id();
    let current = task_get_current();
    if !current.is_null() && unsafe { (*current).is_running() } {
        unsafe { (*current).mark_ready() };
        with_sched(|s| unsafe { s.ready.push(current) });
    }

    let next = pop_next_ready(this_core);
    if next.is_null() {
        if !current.is_null() {
            unsafe { (*current).mark_running() };
        }
        return;
    }

    switch_to(current, next);
}

pub fn schedule_from_trap_exit() {
    schedule();
}

/// YIELD: give up the remainder of this task's turn without blocking.
pub fn r#yield() {
    let current = task_get_current();
    task_record_yield(current);
    with_sched(|s| s.total_yields += 1);
    schedule();
}

/// Called once per timer tick: advance the tick counter, wake due sleepers
/// and timed-out futex waiters, and request a reschedule if a higher
/// priority task than the one currently running has become ready.
pub fn scheduler_timer_tick() {
    let now = TICKS.fetch_add(1, Ordering::Relaxed) + 1;
    super::sleep::wake_due_sleepers(now);
    super::futex::futex_tick(now);

    if !is_scheduling_active() {
        return;
    }
    let this_core = pcr::current_cpu_id();
    let current = task_get_current();
    let current_priority = if current.is_null() {
        u8::MAX
    } else {
        unsafe { (*current).current_priority() }
    };
    let Some(head_priority) = ready_peek_priority(this_core) else {
        return;
    };
    if head_priority < current_priority {
        PreemptGuard::set_reschedule_pending();
        return;
    }
    // Equal-priority tie: round robin. Decrement this core's running task's
    // time slice and pend a switch once it is exhausted (§4.3.2).
    if head_priority == current_priority && !current.is_null() {
        let remaining = unsafe { (*current).time_slice_remaining }.saturating_sub(1);
        unsafe { (*current).time_slice_remaining = remaining };
        if remaining == 0 {
            unsafe { (*current).time_slice_remaining = (*current).time_slice };
            PreemptGuard::set_reschedule_pending();
        }
    }
}

// ---------------------------------------------------------------------------
// Blocking / waking primitives shared by sleep, futex and WAIT/SUSPEND
// ---------------------------------------------------------------------------

/// Block the calling task for `reason` and dispatch away from it. Returns
/// once some other path has marked it Ready again and the dispatcher has
/// switched back to it.
pub fn block_current_task(reason: BlockReason) -> c_int {
    let current = task_get_current();
    if current.is_null() {
        return EINVAL;
    }
    if !unsafe { (*current).block(reason) } {
        return EINVAL;
    }
    unschedule_task(current);
    schedule();
    0
}

/// Administrative RESUME: cancel a blocked task's wait and mark it ready.
/// Per spec this always reports -CANCELED to the woken task, distinct from
/// a normal futex/sleep wakeup which reports 0 or -TIMEDOUT.
pub fn unblock_task(task: *mut Task) -> c_int {
    if task.is_null() {
        return EINVAL;
    }
    if unsafe { (*task).status() } != TaskStatus::Blocked {
        return EINVAL;
    }
    super::sleep::cancel_sleep(unsafe { (*task).task_id });
    super::futex::futex_remove_task(task);
    unsafe {
        (*task)
            .waiting_on
            .store(ECANCELED as u32, Ordering::Release)
    };
    if !unsafe { (*task).try_transition_to(TaskStatus::Ready) } {
        return EINVAL;
    }
    schedule_task(task)
}

/// Block the caller until `target_task_id` terminates. Used by
/// `kthread_join`.
pub fn task_wait_for(target_task_id: u32) -> c_int {
    loop {
        let target = task_find_by_id(target_task_id);
        if target.is_null() || unsafe { (*target).is_terminated() } {
            return 0;
        }
        let current = task_get_current();
        if current.is_null() {
            return ESRCH;
        }
        unsafe {
            (*current)
                .waiting_on
                .store(target_task_id, Ordering::Release)
        };
        let rc = block_current_task(BlockReason::WaitingOnTask);
        if rc != 0 {
            return rc;
        }
    }
}

/// Called from `task_terminate` so any task parked in `task_wait_for` on
/// this task's id wakes up. A full waiter index is overkill for `MAX_TASKS`
/// tasks, so this just scans the table; see `task::task_iterate_active`.
pub fn try_wake_from_task_wait(terminated_task_id: u32) {
    super::task::task_iterate_active(
        |task, ctx| {
            let target_id = ctx as usize as u32;
            let waiting_on = unsafe { (*task).waiting_on.load(Ordering::Acquire) };
            if waiting_on == target_id && unsafe { (*task).is_blocked() } {
                let _ = unblock_task(task);
            }
        },
        terminated_task_id as usize as *mut core::ffi::c_void,
    );
}

/// Entry point reached by `task_entry_trampoline` if a task's entry
/// function returns instead of calling `task_terminate` itself.
pub fn scheduler_task_exit_impl() -> ! {
    let current = task_get_current();
    if !current.is_null() {
        let task_id = unsafe { (*current).task_id };
        klog_info!("SCHED: task {} exited via return", task_id);
        let _ = task_terminate(task_id);
        try_wake_from_task_wait(task_id);
    }
    schedule();
    // schedule() never returns to a Terminated task; if it somehow did,
    // there is nothing safe left to do but halt this core.
    loop {
        unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) };
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

pub fn get_scheduler_stats(
    context_switches: *mut u64,
    yields: *mut u64,
    ready_tasks: *mut u32,
    schedule_calls: *mut u32,
) {
    with_sched(|s| {
        if !context_switches.is_null() {
            unsafe { *context_switches = s.total_switches };
        }
        if !yields.is_null() {
            unsafe { *yields = s.total_yields };
        }
        if !ready_tasks.is_null() {
            unsafe { *ready_tasks = s.ready.len() };
        }
        if !schedule_calls.is_null() {
            unsafe { *schedule_calls = s.schedule_calls as u32 };
        }
    });
}

/// Priorities are 0..=TASK_PRIORITY_IDLE; anything else is -EINVAL at the
/// service-call boundary.
pub fn validate_priority(priority: u8) -> bool {
    priority <= slopos_abi::task::TASK_PRIORITY_IDLE
}
