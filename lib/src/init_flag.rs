//! One-shot and multi-state initialization flags.
//!
//! Smaller sibling of [`OnceLock`](crate::once_lock::OnceLock) for the
//! common case where there is no value to store, only a "has this run yet"
//! bit — used by [`pcr`](crate::pcr) and the scheduler's boot-once paths.

use core::sync::atomic::{AtomicU8, Ordering};

const UNSET: u8 = 0;
const SET: u8 = 1;

/// A single-shot latch: the first caller to [`init_once`](Self::init_once)
/// gets `true`, every later caller gets `false`.
pub struct InitFlag(AtomicU8);

impl InitFlag {
    pub const fn new() -> Self {
        Self(AtomicU8::new(UNSET))
    }

    /// Returns `true` exactly once — on the call that transitions the flag
    /// from unset to set.
    #[inline]
    pub fn init_once(&self) -> bool {
        self.0
            .compare_exchange(UNSET, SET, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire) == SET
    }
}

/// A small named-state flag for code with more than two states
/// (e.g. uninitialized / initializing / ready), compared with plain `u8`
/// values chosen by the caller.
pub struct StateFlag(AtomicU8);

impl StateFlag {
    pub const fn new(initial: u8) -> Self {
        Self(AtomicU8::new(initial))
    }

    #[inline]
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: u8) {
        self.0.store(value, Ordering::Release);
    }

    #[inline]
    pub fn compare_exchange(&self, current: u8, new: u8) -> Result<u8, u8> {
        self.0
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_once_fires_exactly_once() {
        let flag = InitFlag::new();
        assert!(flag.init_once());
        assert!(!flag.init_once());
        assert!(flag.is_set());
    }
}
