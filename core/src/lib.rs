#![no_std]

extern crate alloc;

pub mod irq;
pub mod irq_tests;
pub mod platform;
pub mod scheduler;

pub use slopos_lib::pcr;

pub use scheduler::context_tests;
pub use scheduler::ffi_boundary;
pub use scheduler::futex;
pub use scheduler::kthread;
pub use scheduler::per_cpu;
pub use scheduler::sched_tests;
pub use scheduler::scheduler as sched;
pub use scheduler::task;
