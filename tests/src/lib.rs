#![no_std]

//! Integration test suites for the scheduler/futex core.
//!
//! Each suite below registers itself into the `.test_registry` link
//! section via `define_test_suite!`; there is no runtime registry in this
//! crate to maintain - the boot stage that owns the linker script walks
//! that section directly to find and run every suite.

pub mod scenario_tests;
