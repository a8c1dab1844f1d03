//! Scheduler error taxonomy.
//!
//! Every service-call handler writes one of these negative codes into the
//! caller's r0 rather than unwinding; there is no in-kernel error recovery
//! beyond this. A value of 0 or greater is always success.

pub type SchedResult = i32;

/// Argument does not satisfy a documented constraint (bad priority, bad
/// resource handle).
pub const EINVAL: i32 = -22;
/// Named task is not in the live task list.
pub const ESRCH: i32 = -3;
/// Wait reached its tick deadline.
pub const ETIMEDOUT: i32 = -110;
/// Wait was ended by an external RESUME or TERMINATE.
pub const ECANCELED: i32 = -125;
/// Deferred-wake slot table is full.
pub const ENOSPC: i32 = -28;
/// Task stack canary was corrupted; the task has been force-terminated.
pub const EFAULT: i32 = -14;
/// Operation is not supported in this context (e.g. deferred wake on a
/// PI/owner-tracking futex from interrupt context).
pub const ENOSYS: i32 = -38;
/// Allocation-style failure (wait queue / table exhausted).
pub const ENOMEM: i32 = -12;
/// Value did not match what the caller expected (non-blocking return).
pub const EAGAIN: i32 = -11;

pub const fn is_error(code: i32) -> bool {
    code < 0
}
