//! Kernel-internal task structures.
//!
//! Contains the `Task` struct and CPU register contexts used exclusively by
//! kernel subsystems. The ABI-stable enums and constants remain in
//! `slopos_abi::task`.

use core::ffi::c_void;
use core::mem::offset_of;
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU8, AtomicU32, AtomicU64, Ordering};

pub use slopos_abi::task::{
    BlockReason, INVALID_PROCESS_ID, INVALID_TASK_ID, MAX_TASKS, TASK_KERNEL_STACK_SIZE,
    TASK_NAME_MAX_LEN, TASK_PRIORITY_HIGH, TASK_PRIORITY_IDLE, TASK_PRIORITY_LOW,
    TASK_PRIORITY_NORMAL, TASK_STACK_SIZE, TaskExitReason, TaskExitRecord, TaskFaultReason,
    TaskStatus,
};

// =============================================================================
// SwitchContext — callee-saved registers for software context switch
// =============================================================================

/// Layout must match the assembly in `context_switch.s` / `switch_asm.rs`.
/// Compile-time assertions below verify every offset.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct SwitchContext {
    pub rbx: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rbp: u64,
    pub rsp: u64,
    pub rflags: u64,
    pub rip: u64,
}

impl SwitchContext {
    pub const fn zero() -> Self {
        Self {
            rbx: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rbp: 0,
            rsp: 0,
            rflags: 0x202,
            rip: 0,
        }
    }

    pub const fn new_for_task(entry_point: u64, arg: u64, stack_top: u64, trampoline: u64) -> Self {
        Self {
            rbx: 0,
            r12: entry_point,
            r13: arg,
            r14: 0,
            r15: 0,
            rbp: 0,
            rsp: stack_top - 8,
            rflags: 0x202,
            rip: trampoline,
        }
    }
}

const _: () = assert!(core::mem::size_of::<SwitchContext>() == 72);

pub const SWITCH_CTX_OFF_RBX: usize = 0;
pub const SWITCH_CTX_OFF_R12: usize = 8;
pub const SWITCH_CTX_OFF_R13: usize = 16;
pub const SWITCH_CTX_OFF_R14: usize = 24;
pub const SWITCH_CTX_OFF_R15: usize = 32;
pub const SWITCH_CTX_OFF_RBP: usize = 40;
pub const SWITCH_CTX_OFF_RSP: usize = 48;
pub const SWITCH_CTX_OFF_RFLAGS: usize = 56;
pub const SWITCH_CTX_OFF_RIP: usize = 64;

const _: () = {
    assert!(offset_of!(SwitchContext, rbx) == SWITCH_CTX_OFF_RBX);
    assert!(offset_of!(SwitchContext, r12) == SWITCH_CTX_OFF_R12);
    assert!(offset_of!(SwitchContext, r13) == SWITCH_CTX_OFF_R13);
    assert!(offset_of!(SwitchContext, r14) == SWITCH_CTX_OFF_R14);
    assert!(offset_of!(SwitchContext, r15) == SWITCH_CTX_OFF_R15);
    assert!(offset_of!(SwitchContext, rbp) == SWITCH_CTX_OFF_RBP);
    assert!(offset_of!(SwitchContext, rsp) == SWITCH_CTX_OFF_RSP);
    assert!(offset_of!(SwitchContext, rflags) == SWITCH_CTX_OFF_RFLAGS);
    assert!(offset_of!(SwitchContext, rip) == SWITCH_CTX_OFF_RIP);
};

// =============================================================================
// Task — the kernel task control block
// =============================================================================

#[repr(C)]
pub struct Task {
    pub task_id: u32,
    pub name: [u8; TASK_NAME_MAX_LEN],
    state_atomic: AtomicU8,
    /// Priority assigned by the creator/scheduler calls. Never mutated by
    /// priority inheritance — [`current_priority`](Self::current_priority) is
    /// the effective value the ready queue actually orders on.
    pub base_priority: u8,
    /// Effective priority after boosting from owned futexes. Equal to
    /// `base_priority` unless a lower-priority-numbered waiter is blocked on
    /// a futex this task owns.
    current_priority_atomic: AtomicU8,
    pub block_reason: BlockReason,
    pub process_id: u32,
    pub stack_base: u64,
    pub stack_size: u64,
    pub stack_pointer: u64,
    pub kernel_stack_base: u64,
    pub kernel_stack_top: u64,
    pub kernel_stack_size: u64,
    pub entry_point: u64,
    pub entry_arg: *mut c_void,
    // --- Fields below are not accessed by assembly and can be freely reordered ---
    pub parent_task_id: u32,
    /// Base address of this task's thread-local storage block, embedded at
    /// the top of its kernel stack. Written to the TLS-base register
    /// (FS_BASE on x86_64) on every context switch into this task.
    pub tls_base: u64,
    pub tgid: u32,
    pub time_slice: u64,
    pub time_slice_remaining: u64,
    pub total_runtime: u64,
    pub creation_time: u64,
    pub yield_count: u32,
    pub last_run_timestamp: u64,
    pub waiting_on: AtomicU32,
    pub exit_reason: TaskExitReason,
    pub fault_reason: TaskFaultReason,
    pub exit_code: u32,
    /// Preferred/pinned core, or `None` for either core (spec: at most two
    /// cores, so this is effectively a single bit).
    pub affinity: Option<u8>,
    pub last_cpu: u8,
    pub migration_count: u32,
    /// Head of the intrusive list of futexes this task currently owns
    /// (contention-tracking futexes only). Used to recompute
    /// `current_priority` when a futex is released or its waiter set changes.
    pub owned_futexes: *mut c_void,
    /// Node linkage for the priority-ordered ready queue. Null when not
    /// enqueued.
    pub ready_prev: *mut Task,
    pub ready_next: *mut Task,
    /// Node linkage for the sorted timer list (sleep timeout or futex-wait
    /// timeout — the two share one list, see `scheduler::sleep`).
    pub timer_prev: *mut Task,
    pub timer_next: *mut Task,
    /// Absolute tick at which this task's timer fires, valid only while
    /// linked into the timer list.
    pub timer_deadline: u64,
    /// Node linkage for a futex's priority-ordered waiter list. Null when
    /// not waiting on any futex. Distinct from `ready_prev`/`ready_next`
    /// since a blocked task is never on the ready queue, and distinct from
    /// `timer_prev`/`timer_next` since a futex wait with a timeout is
    /// linked into both lists at once.
    pub waiter_prev: *mut Task,
    pub waiter_next: *mut Task,
    /// Back-pointer to the `Futex` this task is currently linked into the
    /// waiter list of, or null. Lets the shared timer list's timeout path
    /// (which only knows about tasks, not futexes) unlink a timed-out
    /// waiter without a central futex registry.
    pub waiting_futex: AtomicPtr<c_void>,
    pub switch_ctx: SwitchContext,
    pub next_inbox: AtomicPtr<Task>,
    pub refcnt: AtomicU32,
}

impl Task {
    pub const fn invalid() -> Self {
        Self {
            task_id: INVALID_TASK_ID,
            name: [0; TASK_NAME_MAX_LEN],
            state_atomic: AtomicU8::new(TaskStatus::Invalid.as_u8()),
            base_priority: TASK_PRIORITY_NORMAL,
            current_priority_atomic: AtomicU8::new(TASK_PRIORITY_NORMAL),
            block_reason: BlockReason::None,
            process_id: INVALID_PROCESS_ID,
            stack_base: 0,
            stack_size: 0,
            stack_pointer: 0,
            kernel_stack_base: 0,
            kernel_stack_top: 0,
            kernel_stack_size: 0,
            entry_point: 0,
            entry_arg: ptr::null_mut(),
            parent_task_id: INVALID_TASK_ID,
            tls_base: 0,
            tgid: INVALID_TASK_ID,
            time_slice: 0,
            time_slice_remaining: 0,
            total_runtime: 0,
            creation_time: 0,
            yield_count: 0,
            last_run_timestamp: 0,
            waiting_on: AtomicU32::new(INVALID_TASK_ID),
            exit_reason: TaskExitReason::None,
            fault_reason: TaskFaultReason::None,
            exit_code: 0,
            affinity: None,
            last_cpu: 0,
            migration_count: 0,
            owned_futexes: ptr::null_mut(),
            ready_prev: ptr::null_mut(),
            ready_next: ptr::null_mut(),
            timer_prev: ptr::null_mut(),
            timer_next: ptr::null_mut(),
            timer_deadline: 0,
            waiter_prev: ptr::null_mut(),
            waiter_next: ptr::null_mut(),
            waiting_futex: AtomicPtr::new(ptr::null_mut()),
            switch_ctx: SwitchContext::zero(),
            next_inbox: AtomicPtr::new(ptr::null_mut()),
            refcnt: AtomicU32::new(0),
        }
    }

    #[inline]
    fn state(&self) -> u8 {
        self.state_atomic.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_state(&self, state: u8) {
        self.state_atomic.store(state, Ordering::Release);
    }

    #[inline]
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.state())
    }

    #[inline]
    pub fn set_status(&self, status: TaskStatus) {
        self.set_state(status.as_u8());
    }

    #[inline]
    pub fn try_transition_to(&self, target: TaskStatus) -> bool {
        let current = self.state();
        let current_status = TaskStatus::from_u8(current);
        if !current_status.can_transition_to(target) {
            return false;
        }
        self.state_atomic
            .compare_exchange(current, target.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn mark_ready(&self) -> bool {
        self.try_transition_to(TaskStatus::Ready)
    }

    #[inline]
    pub fn mark_running(&self) -> bool {
        self.try_transition_to(TaskStatus::Running)
    }

    #[inline]
    pub fn block(&mut self, reason: BlockReason) -> bool {
        if self.try_transition_to(TaskStatus::Blocked) {
            self.block_reason = reason;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn terminate(&self) -> bool {
        self.try_transition_to(TaskStatus::Terminated)
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.status() == TaskStatus::Blocked
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.status() == TaskStatus::Ready
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.status() == TaskStatus::Running
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.status() == TaskStatus::Terminated
    }

    /// Effective priority the ready queue orders on (lower numeric value
    /// runs first). Equals `base_priority` unless boosted by PI.
    #[inline]
    pub fn current_priority(&self) -> u8 {
        self.current_priority_atomic.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_current_priority(&self, priority: u8) {
        self.current_priority_atomic.store(priority, Ordering::Release);
    }

    /// Reset the effective priority back to the base, e.g. after releasing
    /// all owned futexes.
    #[inline]
    pub fn clear_priority_boost(&self) {
        self.set_current_priority(self.base_priority);
    }

    #[inline]
    pub fn inc_ref(&self) -> u32 {
        let prev = self.refcnt.load(Ordering::Acquire);
        if prev == u32::MAX {
            return u32::MAX;
        }
        self.refcnt.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    pub fn dec_ref(&self) -> bool {
        let prev = self.refcnt.load(Ordering::Acquire);
        if prev == 0 {
            return false;
        }
        self.refcnt.fetch_sub(1, Ordering::AcqRel) == 1
    }

    #[inline]
    pub fn ref_count(&self) -> u32 {
        self.refcnt.load(Ordering::Acquire)
    }
}
