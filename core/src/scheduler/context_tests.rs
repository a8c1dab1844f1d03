//! Context switch and task lifecycle edge case tests.

use core::ffi::c_void;
use core::ptr;

use slopos_lib::klog_info;
use slopos_lib::testing::TestResult;

use super::lifecycle::scheduler_shutdown;
use super::scheduler::init_scheduler;
use super::task::{
    INVALID_TASK_ID, TASK_STACK_SIZE, TaskStatus, init_task_manager, task_create,
    task_find_by_id, task_set_state, task_terminate,
};
use super::task_struct::SwitchContext;

struct ContextFixture;

impl ContextFixture {
    fn new() -> Self {
        scheduler_shutdown();
        if init_task_manager() != 0 {
            klog_info!("CONTEXT_TEST: Failed to init task manager");
        }
        if init_scheduler() != 0 {
            klog_info!("CONTEXT_TEST: Failed to init scheduler");
        }
        Self
    }
}

impl Drop for ContextFixture {
    fn drop(&mut self) {
        scheduler_shutdown();
    }
}

extern "C" fn dummy_entry(_arg: *mut c_void) -> ! {
    loop {
        unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) };
    }
}

static mut CTX_STACK: [u8; TASK_STACK_SIZE as usize] = [0; TASK_STACK_SIZE as usize];

fn create_test_task(name: &[u8]) -> u32 {
    let base = unsafe { CTX_STACK.as_ptr() as u64 };
    task_create(name, dummy_entry, ptr::null_mut(), 1, base, TASK_STACK_SIZE)
}

pub fn test_task_context_initial_state() -> TestResult {
    let _fixture = ContextFixture::new();

    let task_id = create_test_task(b"CtxInit");
    if task_id == INVALID_TASK_ID {
        return TestResult::Fail;
    }

    let task_ptr = task_find_by_id(task_id);
    if task_ptr.is_null() {
        return TestResult::Fail;
    }

    let switch_ctx = unsafe { &(*task_ptr).switch_ctx };
    if switch_ctx.rsp == 0 || switch_ctx.rip == 0 {
        klog_info!("CONTEXT_TEST: BUG - switch_ctx rsp/rip not initialized");
        task_terminate(task_id);
        return TestResult::Fail;
    }

    task_terminate(task_id);
    TestResult::Pass
}

pub fn test_task_state_transitions_exhaustive() -> TestResult {
    let _fixture = ContextFixture::new();

    let task_id = create_test_task(b"StateTrans");
    if task_id == INVALID_TASK_ID {
        return TestResult::Fail;
    }

    let task_ptr = task_find_by_id(task_id);
    if task_ptr.is_null() {
        task_terminate(task_id);
        return TestResult::Fail;
    }

    let initial_state = unsafe { (*task_ptr).status() };
    if initial_state != TaskStatus::Ready {
        klog_info!("CONTEXT_TEST: BUG - New task not in READY state");
        task_terminate(task_id);
        return TestResult::Fail;
    }

    task_set_state(task_id, TaskStatus::Running);
    task_set_state(task_id, TaskStatus::Blocked);
    task_set_state(task_id, TaskStatus::Ready);

    task_terminate(task_id);
    TestResult::Pass
}

pub fn test_task_invalid_state_transition() -> TestResult {
    let _fixture = ContextFixture::new();

    let task_id = create_test_task(b"BadTrans");
    if task_id == INVALID_TASK_ID {
        return TestResult::Fail;
    }

    task_terminate(task_id);

    let _result = task_set_state(task_id, TaskStatus::Running);

    let task_ptr = task_find_by_id(task_id);
    if !task_ptr.is_null() {
        let state = unsafe { (*task_ptr).status() };
        if state == TaskStatus::Running {
            klog_info!("CONTEXT_TEST: BUG - Revived terminated task to RUNNING");
            return TestResult::Fail;
        }
    }

    TestResult::Pass
}

pub fn test_task_double_terminate() -> TestResult {
    let _fixture = ContextFixture::new();

    let task_id = create_test_task(b"DoubleTerm");
    if task_id == INVALID_TASK_ID {
        return TestResult::Fail;
    }

    let _r1 = task_terminate(task_id);
    let _r2 = task_terminate(task_id);
    let _r3 = task_terminate(task_id);

    TestResult::Pass
}

pub fn test_task_terminate_invalid_ids() -> TestResult {
    let _fixture = ContextFixture::new();

    let _ = task_terminate(INVALID_TASK_ID);
    let _ = task_terminate(0);
    let _ = task_terminate(0xFFFF_FFFF);

    TestResult::Pass
}

pub fn test_task_find_after_terminate() -> TestResult {
    let _fixture = ContextFixture::new();

    let task_id = create_test_task(b"FindTerm");
    if task_id == INVALID_TASK_ID {
        return TestResult::Fail;
    }

    let ptr_before = task_find_by_id(task_id);
    if ptr_before.is_null() {
        klog_info!("CONTEXT_TEST: BUG - Couldn't find task before termination");
        return TestResult::Fail;
    }

    task_terminate(task_id);

    let ptr_after = task_find_by_id(task_id);
    if !ptr_after.is_null() {
        let state = unsafe { (*ptr_after).status() };
        if state != TaskStatus::Terminated {
            klog_info!(
                "CONTEXT_TEST: BUG - Terminated task in wrong state: {:?}",
                state
            );
            return TestResult::Fail;
        }
    }

    TestResult::Pass
}

pub fn test_task_rapid_create_terminate() -> TestResult {
    let _fixture = ContextFixture::new();

    for _i in 0..20 {
        let task_id = create_test_task(b"Rapid");
        if task_id == INVALID_TASK_ID {
            continue;
        }
        task_terminate(task_id);
    }

    TestResult::Pass
}

pub fn test_switch_context_struct_size() -> TestResult {
    use core::mem::size_of;

    let size = size_of::<SwitchContext>();
    if size != 72 {
        klog_info!(
            "CONTEXT_TEST: SwitchContext size wrong: {} (expected 72)",
            size
        );
        return TestResult::Fail;
    }
    TestResult::Pass
}

pub fn test_switch_context_offsets() -> TestResult {
    use super::task_struct::{
        SWITCH_CTX_OFF_R12, SWITCH_CTX_OFF_R13, SWITCH_CTX_OFF_R14, SWITCH_CTX_OFF_R15,
        SWITCH_CTX_OFF_RBP, SWITCH_CTX_OFF_RBX, SWITCH_CTX_OFF_RFLAGS, SWITCH_CTX_OFF_RIP,
        SWITCH_CTX_OFF_RSP,
    };

    if SWITCH_CTX_OFF_RBX != 0 {
        return TestResult::Fail;
    }
    if SWITCH_CTX_OFF_R12 != 8 {
        return TestResult::Fail;
    }
    if SWITCH_CTX_OFF_R13 != 16 {
        return TestResult::Fail;
    }
    if SWITCH_CTX_OFF_R14 != 24 {
        return TestResult::Fail;
    }
    if SWITCH_CTX_OFF_R15 != 32 {
        return TestResult::Fail;
    }
    if SWITCH_CTX_OFF_RBP != 40 {
        return TestResult::Fail;
    }
    if SWITCH_CTX_OFF_RSP != 48 {
        return TestResult::Fail;
    }
    if SWITCH_CTX_OFF_RFLAGS != 56 {
        return TestResult::Fail;
    }
    if SWITCH_CTX_OFF_RIP != 64 {
        return TestResult::Fail;
    }
    TestResult::Pass
}

pub fn test_switch_context_zero_init() -> TestResult {
    let ctx = SwitchContext::zero();
    if ctx.rbx != 0 || ctx.r12 != 0 || ctx.r13 != 0 || ctx.r14 != 0 || ctx.r15 != 0 {
        return TestResult::Fail;
    }
    if ctx.rbp != 0 || ctx.rsp != 0 || ctx.rip != 0 {
        return TestResult::Fail;
    }
    if ctx.rflags != 0x202 {
        klog_info!(
            "CONTEXT_TEST: SwitchContext::zero() rflags wrong: {:#x}",
            ctx.rflags
        );
        return TestResult::Fail;
    }
    TestResult::Pass
}

pub fn test_switch_context_setup_initial() -> TestResult {
    let stack_top: u64 = 0x1000;
    let entry: u64 = 0xDEADBEEF;
    let arg: u64 = 0xCAFEBABE;
    let trampoline: u64 = 0x12345678;

    let ctx = SwitchContext::new_for_task(entry, arg, stack_top, trampoline);

    if ctx.rsp != stack_top - 8 {
        klog_info!("CONTEXT_TEST: builder rsp wrong: {:#x}", ctx.rsp);
        return TestResult::Fail;
    }
    if ctx.rip != trampoline {
        klog_info!("CONTEXT_TEST: builder rip wrong: {:#x}", ctx.rip);
        return TestResult::Fail;
    }
    if ctx.r12 != entry {
        klog_info!("CONTEXT_TEST: builder r12 wrong: {:#x}", ctx.r12);
        return TestResult::Fail;
    }
    if ctx.r13 != arg {
        klog_info!("CONTEXT_TEST: builder r13 wrong: {:#x}", ctx.r13);
        return TestResult::Fail;
    }
    if ctx.rflags != 0x202 {
        return TestResult::Fail;
    }
    TestResult::Pass
}

pub fn test_task_has_switch_ctx() -> TestResult {
    let _fixture = ContextFixture::new();

    let task_id = create_test_task(b"SwitchTest");
    if task_id == INVALID_TASK_ID {
        return TestResult::Fail;
    }

    let task_ptr = task_find_by_id(task_id);
    if task_ptr.is_null() {
        task_terminate(task_id);
        return TestResult::Fail;
    }

    let switch_ctx = unsafe { &(*task_ptr).switch_ctx };
    if switch_ctx.rflags != 0x202 {
        klog_info!(
            "CONTEXT_TEST: Task switch_ctx rflags not initialized: {:#x}",
            switch_ctx.rflags
        );
        task_terminate(task_id);
        return TestResult::Fail;
    }

    task_terminate(task_id);
    TestResult::Pass
}

slopos_lib::define_test_suite!(
    context,
    [
        test_task_context_initial_state,
        test_task_state_transitions_exhaustive,
        test_task_invalid_state_transition,
        test_task_double_terminate,
        test_task_terminate_invalid_ids,
        test_task_find_after_terminate,
        test_task_rapid_create_terminate,
        test_switch_context_struct_size,
        test_switch_context_offsets,
        test_switch_context_zero_init,
        test_switch_context_setup_initial,
        test_task_has_switch_ctx,
    ]
);
