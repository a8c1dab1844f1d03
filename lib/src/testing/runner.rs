use super::TestResult;
use crate::klog_info;

/// Run a single test closure, catching panics via [`catch_panic!`] so one
/// failing test does not take down the whole suite, and logging a one-line
/// PASS/FAIL/PANIC verdict.
pub fn run_single_test(name: &str, test_fn: impl FnOnce() -> TestResult) -> TestResult {
    let cell = core::cell::Cell::new(TestResult::Skipped);
    let rc = crate::catch_panic!({
        cell.set(test_fn());
        0
    });

    let result = if rc == 0 {
        cell.get()
    } else {
        TestResult::Panic
    };

    match result {
        TestResult::Pass => klog_info!("TEST PASS: {}", name),
        TestResult::Fail => klog_info!("TEST FAIL: {}", name),
        TestResult::Panic => klog_info!("TEST PANIC: {}", name),
        TestResult::Skipped => klog_info!("TEST SKIP: {}", name),
    }

    result
}
