//! Lazily-registered hardware service table.
//!
//! A [`ServiceCell<T>`] holds a struct of function pointers (a "service
//! table") that is registered once during early boot by whichever crate has
//! visibility into the concrete driver/platform implementation, and read
//! from anywhere else in the kernel thereafter. Built on [`OnceLock`] rather
//! than a raw `AtomicPtr`, so [`get`] is a single acquire load on the
//! already-registered fast path and a hard error if read too early.
//!
//! [`get`]: ServiceCell::get

use crate::once_lock::OnceLock;

pub struct ServiceCell<T: 'static>(OnceLock<T>);

impl<T> ServiceCell<T> {
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Register the service table. Only the first call takes effect.
    pub fn register(&self, value: T) {
        self.0.call_once(|| value);
    }

    /// Fetch the registered service table.
    ///
    /// # Panics
    /// Panics if called before [`register`](Self::register) — a service
    /// table is read-only infrastructure and must be wired during boot
    /// before any subsystem that depends on it runs.
    pub fn get(&self) -> &T {
        self.0
            .get()
            .expect("service table accessed before registration")
    }

    pub fn is_registered(&self) -> bool {
        self.0.is_completed()
    }
}
