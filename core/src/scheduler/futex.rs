//! Futex: a wait queue bound to an observable value word, with optional
//! contention tracking, owner tracking and priority inheritance.
//!
//! Unlike the hash-bucket design this replaces, a [`Futex`] is a persistent
//! object the caller owns (embedded in a mutex, typically `static`), the
//! same way `scheduler_futex_init`/`scheduler_futex_wait`/`scheduler_futex_wake`
//! take a `struct futex *` directly in the original rather than hashing an
//! address. Algorithm grounded in `scheduler_wait_svc`/`scheduler_wake_futex`/
//! `scheduler_futex_wake`.

use core::ffi::c_void;
use core::ptr;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use slopos_abi::error::{ECANCELED, ENOSYS, ETIMEDOUT};
use slopos_abi::syscall::{
    FUTEX_FLAG_CONTENTION_TRACKING, FUTEX_FLAG_OWNER_TRACKING, FUTEX_FLAG_PRIORITY_INHERITANCE,
};
use slopos_abi::task::BlockReason;
use slopos_lib::cpu_local;
use slopos_lib::cpu_local::CpuLocal;
use slopos_lib::IrqMutex;

use super::scheduler::{block_current_task, reprioritize_task, schedule_task, scheduler_get_current_task};
use super::sleep::{deadline_for_ms, timer_push, timer_remove};
use super::task_struct::Task;

/// Bit 0 of the value word: waiters are present.
const VALUE_CONTENTION_BIT: u64 = 1 << 0;
/// Bit 1 is reserved and must stay zero. Bits 2.. hold the owning task's
/// pointer (tasks are at least 4-byte aligned so the low two bits are free).
const VALUE_OWNER_MASK: u64 = !0x3u64;

#[inline]
fn encode_owner(owner: *mut Task, contended: bool) -> u64 {
    let base = owner as u64 & VALUE_OWNER_MASK;
    if contended { base | VALUE_CONTENTION_BIT } else { base }
}

#[inline]
fn decode_owner(value: u64) -> *mut Task {
    (value & VALUE_OWNER_MASK) as *mut Task
}

pub struct Futex {
    value: AtomicU64,
    flags: u32,
    inner: IrqMutex<FutexInner>,
}

struct FutexInner {
    /// Head of the priority-ordered waiter list, linked through
    /// `Task::waiter_prev`/`waiter_next`.
    waiters: *mut Task,
    /// Linkage in the current owner's `owned_futexes` chain.
    owned_prev: *mut Futex,
    owned_next: *mut Futex,
    linked_owner: *mut Task,
}

unsafe impl Send for FutexInner {}

impl Futex {
    pub const fn new(flags: u32) -> Self {
        Self {
            value: AtomicU64::new(0),
            flags,
            inner: IrqMutex::new(FutexInner {
                waiters: ptr::null_mut(),
                owned_prev: ptr::null_mut(),
                owned_next: ptr::null_mut(),
                linked_owner: ptr::null_mut(),
            }),
        }
    }

    fn pi_owner_tracking(&self) -> bool {
        self.flags & (FUTEX_FLAG_PRIORITY_INHERITANCE | FUTEX_FLAG_OWNER_TRACKING)
            == (FUTEX_FLAG_PRIORITY_INHERITANCE | FUTEX_FLAG_OWNER_TRACKING)
    }

    fn owner_tracking(&self) -> bool {
        self.flags & FUTEX_FLAG_OWNER_TRACKING != 0
    }

    fn contention_tracking(&self) -> bool {
        self.flags & FUTEX_FLAG_CONTENTION_TRACKING != 0
    }

    pub fn raw_value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Waiter-list helpers, priority-ordered via `Task::waiter_prev`/`waiter_next`
// exactly like `per_cpu::ReadyQueue`, but kept local since a waiting task is
// never simultaneously on the ready queue.
// ---------------------------------------------------------------------------

fn waiter_contains(inner: &FutexInner, task: *mut Task) -> bool {
    let mut cursor = inner.waiters;
    while !cursor.is_null() {
        if cursor == task {
            return true;
        }
        cursor = unsafe { (*cursor).waiter_next };
    }
    false
}

fn waiter_push(inner: &mut FutexInner, task: *mut Task) {
    if waiter_contains(inner, task) {
        return;
    }
    let priority = unsafe { (*task).current_priority() };
    let mut cursor = inner.waiters;
    let mut prev: *mut Task = ptr::null_mut();
    while !cursor.is_null() && unsafe { (*cursor).current_priority() } <= priority {
        prev = cursor;
        cursor = unsafe { (*cursor).waiter_next };
    }
    unsafe {
        (*task).waiter_next = cursor;
        (*task).waiter_prev = prev;
        if !cursor.is_null() {
            (*cursor).waiter_prev = task;
        }
        if prev.is_null() {
            inner.waiters = task;
        } else {
            (*prev).waiter_next = task;
        }
    }
}

fn waiter_remove(inner: &mut FutexInner, task: *mut Task) -> bool {
    if !waiter_contains(inner, task) {
        return false;
    }
    unsafe {
        let prev = (*task).waiter_prev;
        let next = (*task).waiter_next;
        if prev.is_null() {
            inner.waiters = next;
        } else {
            (*prev).waiter_next = next;
        }
        if !next.is_null() {
            (*next).waiter_prev = prev;
        }
        (*task).waiter_prev = ptr::null_mut();
        (*task).waiter_next = ptr::null_mut();
    }
    true
}

fn waiter_pop_highest(inner: &mut FutexInner) -> *mut Task {
    let task = inner.waiters;
    if !task.is_null() {
        waiter_remove(inner, task);
    }
    task
}

fn highest_waiter_priority(inner: &FutexInner) -> Option<u8> {
    if inner.waiters.is_null() {
        None
    } else {
        Some(unsafe { (*inner.waiters).current_priority() })
    }
}

fn set_waiting_futex(task: *mut Task, futex: *const Futex) {
    unsafe { (*task).waiting_futex.store(futex as *mut c_void, Ordering::Release) };
}

fn clear_waiting_futex(task: *mut Task) {
    unsafe { (*task).waiting_futex.store(ptr::null_mut(), Ordering::Release) };
}

// ---------------------------------------------------------------------------
// Owned-futex chain, linked through `Futex`'s own `owned_prev/next` and
// rooted at `Task::owned_futexes`. Each helper below takes at most one
// `Futex`'s lock at a time; never two locks held simultaneously.
// ---------------------------------------------------------------------------

fn owned_chain_push(owner: *mut Task, futex_ptr: *const Futex) {
    let futex_ptr = futex_ptr as *mut Futex;

    let already_linked = {
        let inner = unsafe { &*futex_ptr }.inner.lock();
        inner.linked_owner == owner
    };
    if already_linked {
        return;
    }

    let head = unsafe { (*owner).owned_futexes } as *mut Futex;
    if !head.is_null() {
        let mut head_inner = unsafe { &*head }.inner.lock();
        head_inner.owned_prev = futex_ptr;
    }
    {
        let mut inner = unsafe { &*futex_ptr }.inner.lock();
        inner.owned_next = head;
        inner.owned_prev = ptr::null_mut();
        inner.linked_owner = owner;
    }
    unsafe { (*owner).owned_futexes = futex_ptr as *mut c_void };
}

fn owned_chain_remove(owner: *mut Task, futex_ptr: *const Futex) {
    let futex_ptr = futex_ptr as *mut Futex;

    let (prev, next) = {
        let mut inner = unsafe { &*futex_ptr }.inner.lock();
        if inner.linked_owner != owner {
            return;
        }
        let prev = inner.owned_prev;
        let next = inner.owned_next;
        inner.owned_prev = ptr::null_mut();
        inner.owned_next = ptr::null_mut();
        inner.linked_owner = ptr::null_mut();
        (prev, next)
    };

    if prev.is_null() {
        unsafe { (*owner).owned_futexes = next as *mut c_void };
    } else {
        let mut prev_inner = unsafe { &*prev }.inner.lock();
        prev_inner.owned_next = next;
    }
    if !next.is_null() {
        let mut next_inner = unsafe { &*next }.inner.lock();
        next_inner.owned_prev = prev;
    }
}

/// Recompute and apply `owner`'s effective priority as the min of its base
/// priority and the highest waiter priority across every PI futex it still
/// owns (§3 invariant ii).
fn recompute_owner_priority(owner: *mut Task) {
    if owner.is_null() {
        return;
    }
    let base = unsafe { (*owner).base_priority };
    let mut best = base;
    let mut cursor = unsafe { (*owner).owned_futexes } as *mut Futex;
    while !cursor.is_null() {
        let (waiter_priority, next) = {
            let inner = unsafe { &*cursor }.inner.lock();
            (highest_waiter_priority(&inner), inner.owned_next)
        };
        if let Some(p) = waiter_priority {
            if p < best {
                best = p;
            }
        }
        cursor = next;
    }
    unsafe { (*owner).set_current_priority(best) };
    reprioritize_task(owner);
}

// ---------------------------------------------------------------------------
// WAIT / WAKE (§4.4)
// ---------------------------------------------------------------------------

/// WAIT: block until woken, timed out, or administratively cancelled.
/// Returns 0, -ETIMEDOUT or -ECANCELED.
pub fn futex_wait(futex: &Futex, expected: u64, timeout_ms: u32) -> i32 {
    let current = scheduler_get_current_task();
    if current.is_null() {
        return slopos_abi::error::EINVAL;
    }

    let contended_value = if futex.contention_tracking() {
        expected | VALUE_CONTENTION_BIT
    } else {
        expected
    };

    // The value check and the waiter-list push must happen under one held
    // lock: otherwise a `futex_wake` landing in the gap between them sees an
    // empty waiter list, wakes nobody, and this WAIT blocks forever having
    // missed it (§4.4, §5 ordering guarantee).
    let pi_owner = {
        let mut inner = futex.inner.lock();
        let observed = futex.value.load(Ordering::Acquire);
        if observed != expected && observed != contended_value {
            // Value already moved: do not block (§4.4 round-trip invariant).
            return 0;
        }
        if futex.contention_tracking() && observed == expected {
            futex
                .value
                .compare_exchange(expected, contended_value, Ordering::AcqRel, Ordering::Acquire)
                .ok();
        }
        waiter_push(&mut inner, current);
        if futex.pi_owner_tracking() {
            decode_owner(futex.value.load(Ordering::Acquire))
        } else {
            ptr::null_mut()
        }
    };
    set_waiting_futex(current, futex as *const Futex);

    if !pi_owner.is_null() && pi_owner != current {
        owned_chain_push(pi_owner, futex as *const Futex);
        let waiter_priority = unsafe { (*current).current_priority() };
        if waiter_priority < unsafe { (*pi_owner).current_priority() } {
            unsafe { (*pi_owner).set_current_priority(waiter_priority) };
            reprioritize_task(pi_owner);
        }
    }

    let has_timeout = timeout_ms != 0 && timeout_ms != u32::MAX;
    if has_timeout {
        timer_push(current, deadline_for_ms(timeout_ms));
    }

    unsafe { (*current).waiting_on.store(u32::MAX, Ordering::Release) };
    block_current_task(BlockReason::MutexWait);

    if has_timeout {
        timer_remove(current);
    }
    clear_waiting_futex(current);

    let outcome = unsafe { (*current).waiting_on.load(Ordering::Acquire) } as i32;
    if outcome == ECANCELED {
        ECANCELED
    } else if outcome == ETIMEDOUT {
        ETIMEDOUT
    } else {
        0
    }
}

/// WAKE: returns the number of tasks woken, or a negative error code.
/// `all` wakes every waiter on a plain futex; an owner-tracking futex can
/// only ever hand off to one new owner per call regardless of `all`.
pub fn futex_wake(futex: &Futex, all: bool) -> i32 {
    let pi_owner_tracking = futex.pi_owner_tracking();

    if pi_owner_tracking {
        let old_owner = decode_owner(futex.value.load(Ordering::Acquire));
        if !old_owner.is_null() {
            owned_chain_remove(old_owner, futex as *const Futex);
            recompute_owner_priority(old_owner);
        }
    }

    let mut woken = 0i32;
    let mut new_owner: *mut Task = ptr::null_mut();
    {
        let mut inner = futex.inner.lock();
        loop {
            let task = waiter_pop_highest(&mut inner);
            if task.is_null() {
                break;
            }

            if futex.owner_tracking() {
                let next_value = encode_owner(task, !inner.waiters.is_null());
                futex.value.store(next_value, Ordering::Release);
                new_owner = task;
            }

            timer_remove(task);
            clear_waiting_futex(task);
            unsafe { (*task).waiting_on.store(0, Ordering::Release) };
            let _ = schedule_task(task);
            woken += 1;

            // Owner-tracking futexes hand off to exactly one new owner; a
            // plain futex keeps popping while `all` was requested.
            if futex.owner_tracking() || !all {
                break;
            }
        }

        if futex.contention_tracking() {
            let has_waiters = !inner.waiters.is_null();
            let cur = futex.value.load(Ordering::Acquire);
            let next = if has_waiters {
                cur | VALUE_CONTENTION_BIT
            } else {
                cur & !VALUE_CONTENTION_BIT
            };
            futex.value.store(next, Ordering::Release);
        }
    }

    if pi_owner_tracking && !new_owner.is_null() {
        owned_chain_push(new_owner, futex as *const Futex);
        recompute_owner_priority(new_owner);
    }

    woken
}

/// Explicitly drop `task` from `futex`'s waiter list (and owned chain, if
/// it was the owner) without waking it. Called when a specific futex a
/// task could be blocked on is known to the caller (e.g. a mutex being torn
/// down with a waiter still parked on it).
pub fn futex_forget(futex: &Futex, task: *mut Task) {
    let removed = {
        let mut inner = futex.inner.lock();
        waiter_remove(&mut inner, task)
    };
    if removed {
        clear_waiting_futex(task);
    }
    owned_chain_remove(task, futex as *const Futex);
}

/// Best-effort cleanup hook for task teardown (`task_terminate`,
/// `scheduler::unblock_task`). A task's own `waiting_futex` back-pointer is
/// enough to find the one futex it could be linked into, so no central
/// futex registry is needed.
pub fn futex_remove_task(task: *mut Task) {
    if task.is_null() {
        return;
    }
    let futex_ptr = unsafe { (*task).waiting_futex.swap(ptr::null_mut(), Ordering::AcqRel) } as *const Futex;
    if futex_ptr.is_null() {
        return;
    }
    let futex = unsafe { &*futex_ptr };
    {
        let mut inner = futex.inner.lock();
        waiter_remove(&mut inner, task);
    }
    owned_chain_remove(task, futex_ptr);
}

/// Timer-list timeout callback for a `BlockReason::MutexWait` task: unlink
/// it from whatever futex it was waiting on, report -ETIMEDOUT, and make it
/// ready again. Called from `sleep::wake_due_sleepers`, which shares the
/// timer list a futex wait's timeout was pushed onto.
pub fn futex_timeout_wake(task: *mut Task) {
    if task.is_null() {
        return;
    }
    let futex_ptr = unsafe { (*task).waiting_futex.swap(ptr::null_mut(), Ordering::AcqRel) } as *const Futex;
    if !futex_ptr.is_null() {
        let futex = unsafe { &*futex_ptr };
        let was_waiting = {
            let mut inner = futex.inner.lock();
            waiter_remove(&mut inner, task)
        };
        if was_waiting && futex.contention_tracking() {
            let mut inner = futex.inner.lock();
            let has_waiters = !inner.waiters.is_null();
            let cur = futex.value.load(Ordering::Acquire);
            let next = if has_waiters {
                cur | VALUE_CONTENTION_BIT
            } else {
                cur & !VALUE_CONTENTION_BIT
            };
            futex.value.store(next, Ordering::Release);
            drop(inner);
        }
    }
    unsafe { (*task).waiting_on.store(ETIMEDOUT as u32, Ordering::Release) };
    let _ = schedule_task(task);
}

// ---------------------------------------------------------------------------
// Deferred wake from interrupt context (§4.4.1)
// ---------------------------------------------------------------------------

const MAX_DEFERRED_WAKE: usize = 8;

struct DeferredWakeSlots {
    slots: [AtomicU64; MAX_DEFERRED_WAKE],
    given: AtomicU32,
    taken: AtomicU32,
}

impl DeferredWakeSlots {
    const fn new() -> Self {
        const ZERO: AtomicU64 = AtomicU64::new(0);
        Self {
            slots: [ZERO; MAX_DEFERRED_WAKE],
            given: AtomicU32::new(0),
            taken: AtomicU32::new(0),
        }
    }
}

cpu_local! {
    static DEFERRED_WAKE: DeferredWakeSlots = DeferredWakeSlots::new();
}

/// Interrupt-context wake: tag `futex`'s address with the wake-all bit and
/// post it to an empty per-core slot instead of touching the scheduler
/// lock directly. Forbidden for PI/owner-tracking futexes, since there is
/// no owning task context available from an ISR to hand ownership to.
pub fn futex_wake_deferred(futex: &Futex, all: bool) -> i32 {
    if futex.pi_owner_tracking() || futex.owner_tracking() {
        return ENOSYS;
    }

    let tag = (futex as *const Futex as u64 & !1) | if all { 1 } else { 0 };
    let pinned = DEFERRED_WAKE.get();

    for slot in pinned.slots.iter() {
        if slot.load(Ordering::Acquire) == tag {
            // Duplicate wake against the same futex within this drain:
            // coalesce instead of taking a second slot.
            return 0;
        }
    }

    for slot in pinned.slots.iter() {
        if slot
            .compare_exchange(0, tag, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            pinned.given.fetch_add(1, Ordering::Release);
            return 0;
        }
    }

    slopos_abi::error::ENOSPC
}

/// Drains this core's deferred-wake slots. Called from the dispatch path in
/// `scheduler::schedule`, which already holds the preemption guard needed
/// for a real wake.
pub fn drain_deferred_wakes() {
    let pinned = DEFERRED_WAKE.get();
    loop {
        let given = pinned.given.load(Ordering::Acquire);
        let taken = pinned.taken.load(Ordering::Acquire);
        if taken == given {
            break;
        }
        let mut drained_any = false;
        for slot in pinned.slots.iter() {
            let tag = slot.swap(0, Ordering::AcqRel);
            if tag == 0 {
                continue;
            }
            drained_any = true;
            pinned.taken.fetch_add(1, Ordering::Release);
            let all = tag & 1 != 0;
            let addr = (tag & !1) as *const Futex;
            if !addr.is_null() {
                let _ = futex_wake(unsafe { &*addr }, all);
            }
        }
        if !drained_any {
            break;
        }
    }
}

/// Timeout expiry for futex waiters is driven through the shared timer
/// list by `sleep::wake_due_sleepers` (which dispatches to
/// [`futex_timeout_wake`] for `BlockReason::MutexWait` tasks), so this hook
/// is presently a no-op; kept as the call site `scheduler_timer_tick` uses.
pub fn futex_tick(_now_tick: u64) {}

#[cfg(test)]
mod tests {
    use super::*;
    use slopos_abi::syscall::FUTEX_FLAG_CONTENTION_TRACKING;

    #[test]
    fn encode_decode_owner_roundtrip() {
        let mut task = Task::invalid();
        let ptr = &mut task as *mut Task;
        let encoded = encode_owner(ptr, true);
        assert_eq!(decode_owner(encoded), ptr);
        assert_eq!(encoded & VALUE_CONTENTION_BIT, VALUE_CONTENTION_BIT);
    }

    #[test]
    fn futex_flags_roundtrip() {
        let f = Futex::new(FUTEX_FLAG_CONTENTION_TRACKING);
        assert!(f.contention_tracking());
        assert!(!f.owner_tracking());
        assert!(!f.pi_owner_tracking());
    }
}
