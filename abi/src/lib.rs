//! Kernel-internal ABI types shared across the `slopos-core` scheduler
//! modules: task attributes, the service-call number table, and the
//! scheduler's error taxonomy.
//!
//! All types in this crate are `#[repr(C)]` where layout is part of the
//! cross-core or cross-module contract.

#![no_std]
#![forbid(unsafe_code)]

pub mod error;
pub mod syscall;
pub mod task;

pub use error::*;
pub use syscall::*;
pub use task::*;
