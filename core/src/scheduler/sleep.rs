//! Sorted timer list.
//!
//! Both sleep timeouts and futex-wait timeouts are "wake this task at tick
//! T" requests, so they share one intrusive, deadline-sorted list instead of
//! the fixed-size `[SleepEntry; MAX_TASKS]` array the teacher used for sleep
//! alone. Soonest-expiring entry is always at the head, so the scheduler's
//! per-tick timeout check is O(1) to test and O(k) to drain the k entries
//! that actually fired.

use alloc::vec::Vec;
use core::ffi::c_int;
use core::ptr;

use slopos_abi::task::BlockReason;
use slopos_lib::IrqMutex;

use super::scheduler::{
    is_scheduling_active, schedule, schedule_task, scheduler_get_current_task, unschedule_task,
};
use super::task::{
    INVALID_TASK_ID, TaskStatus, task_find_by_id, task_is_blocked, task_is_invalid,
    task_is_terminated, task_set_state_with_reason,
};
use super::task_struct::Task;
use crate::platform;

/// Wraparound-safe "has this deadline passed" check: true as long as the gap
/// between `now` and `deadline` is less than half the tick-counter space,
/// so a single wrap of the 64-bit tick counter never produces a spurious
/// "already expired" verdict.
#[inline]
pub fn tick_reached(now_tick: u64, deadline_tick: u64) -> bool {
    now_tick.wrapping_sub(deadline_tick) < (1u64 << 63)
}

struct TimerList {
    head: *mut Task,
}

unsafe impl Send for TimerList {}

impl TimerList {
    const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
        }
    }

    fn contains(&self, task: *mut Task) -> bool {
        let mut cursor = self.head;
        while !cursor.is_null() {
            if cursor == task {
                return true;
            }
            cursor = unsafe { (*cursor).timer_next };
        }
        false
    }

    /// Insert `task`, sorted ascending by `deadline`. No-op if already linked.
    fn push(&mut self, task: *mut Task, deadline: u64) {
        if task.is_null() || self.contains(task) {
            return;
        }
        unsafe { (*task).timer_deadline = deadline };

        let mut cursor = self.head;
        let mut prev: *mut Task = ptr::null_mut();
        while !cursor.is_null() && unsafe { (*cursor).timer_deadline } <= deadline {
            prev = cursor;
            cursor = unsafe { (*cursor).timer_next };
        }

        unsafe {
            (*task).timer_next = cursor;
            (*task).timer_prev = prev;
            if !cursor.is_null() {
                (*cursor).timer_prev = task;
            }
            if prev.is_null() {
                self.head = task;
            } else {
                (*prev).timer_next = task;
            }
        }
    }

    fn remove(&mut self, task: *mut Task) -> bool {
        if task.is_null() || !self.contains(task) {
            return false;
        }
        unsafe {
            let prev = (*task).timer_prev;
            let next = (*task).timer_next;
            if prev.is_null() {
                self.head = next;
            } else {
                (*prev).timer_next = next;
            }
            if !next.is_null() {
                (*next).timer_prev = prev;
            }
            (*task).timer_prev = ptr::null_mut();
            (*task).timer_next = ptr::null_mut();
            (*task).timer_deadline = 0;
        }
        true
    }

    /// Nearest expiry in the list, if any — O(1) thanks to the sort order.
    fn next_deadline(&self) -> Option<u64> {
        if self.head.is_null() {
            None
        } else {
            Some(unsafe { (*self.head).timer_deadline })
        }
    }

    fn drain_due(&mut self, now_tick: u64) -> Vec<*mut Task> {
        let mut due = Vec::new();
        while let Some(deadline) = self.next_deadline() {
            if !tick_reached(now_tick, deadline) {
                break;
            }
            let task = self.head;
            self.remove(task);
            due.push(task);
        }
        due
    }

    fn clear(&mut self) {
        while !self.head.is_null() {
            let task = self.head;
            self.remove(task);
        }
    }
}

static TIMER_LIST: IrqMutex<TimerList> = IrqMutex::new(TimerList::new());

/// Link `task` into the shared timer list so it fires at `deadline` (an
/// absolute tick count). Used for both sleep and futex-wait timeouts.
pub fn timer_push(task: *mut Task, deadline: u64) {
    TIMER_LIST.lock().push(task, deadline);
}

/// Unlink `task` from the timer list if present (e.g. woken before its
/// timeout, or the wait was cancelled). Returns whether it was linked.
pub fn timer_remove(task: *mut Task) -> bool {
    TIMER_LIST.lock().remove(task)
}

/// Nearest pending deadline across all sleepers and timed futex waits.
pub fn timer_next_deadline() -> Option<u64> {
    TIMER_LIST.lock().next_deadline()
}

fn ms_to_ticks(ms: u32) -> u64 {
    let freq = platform::timer_frequency() as u64;
    if freq == 0 {
        return 1;
    }
    let ticks = (ms as u64).saturating_mul(freq).saturating_add(999) / 1000;
    ticks.max(1)
}

/// Absolute deadline tick for a relative millisecond timeout issued now.
pub fn deadline_for_ms(ms: u32) -> u64 {
    platform::timer_ticks().wrapping_add(ms_to_ticks(ms))
}

fn wake_sleeping_task(task: *mut Task) {
    if task.is_null() || task_is_invalid(task) || task_is_terminated(task) {
        return;
    }
    if !task_is_blocked(task) {
        return;
    }
    match unsafe { (*task).block_reason } {
        BlockReason::Sleep => {
            let task_id = unsafe { (*task).task_id };
            if task_set_state_with_reason(task_id, TaskStatus::Ready, BlockReason::None) != 0 {
                return;
            }
            core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
            let _ = schedule_task(task);
        }
        BlockReason::MutexWait => super::futex::futex_timeout_wake(task),
        _ => {}
    }
}

/// Called once per timer tick: wake every sleeping task and timed-out futex
/// waiter whose deadline has passed. Both share this one sorted list, so a
/// single drain handles both kinds.
pub fn wake_due_sleepers(now_tick: u64) {
    let due = TIMER_LIST.lock().drain_due(now_tick);
    for task in due {
        wake_sleeping_task(task);
    }
}

pub fn reset_sleep_queue() {
    TIMER_LIST.lock().clear();
}

pub fn cancel_sleep(task_id: u32) {
    if task_id == INVALID_TASK_ID {
        return;
    }
    let task = task_find_by_id(task_id);
    if !task.is_null() {
        timer_remove(task);
    }
}

pub fn sleep_current_task_ms(ms: u32) -> c_int {
    if ms == 0 {
        return 0;
    }

    if !is_scheduling_active() {
        platform::timer_poll_delay_ms(ms);
        return 0;
    }

    let current = scheduler_get_current_task();
    if current.is_null() {
        return -1;
    }
    if unsafe { (*current).base_priority } == slopos_abi::task::TASK_PRIORITY_IDLE {
        platform::timer_poll_delay_ms(ms);
        return 0;
    }

    let task_id = unsafe { (*current).task_id };
    if task_id == INVALID_TASK_ID {
        return -1;
    }

    let deadline = deadline_for_ms(ms);
    timer_push(current, deadline);

    if task_set_state_with_reason(task_id, TaskStatus::Blocked, BlockReason::Sleep) != 0 {
        cancel_sleep(task_id);
        return -1;
    }

    unschedule_task(current);
    schedule();
    0
}
