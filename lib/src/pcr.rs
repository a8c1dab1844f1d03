//! Per-core control block for SMP support.
//!
//! # Assembly offsets (critical)
//!
//! `self_ref` and `cpu_id` sit at fixed offsets so `context_switch` can reach
//! them via `gs:[offset]` without a Rust-level indirection. Do not change
//! these two without updating `core/src/scheduler/switch_asm.rs`.

use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, Ordering};

use crate::InitFlag;
use crate::cpu::msr::{Msr, write_msr};

/// This kernel targets exactly two cores (spec Non-goal: no hot-plugging,
/// no more than two cores).
pub const MAX_CPUS: usize = 2;

/// Per-core control block. `GS_BASE` points to this structure in kernel
/// mode on the owning core.
#[repr(C, align(64))]
pub struct ProcessorControlRegion {
    /// Self-reference for GS-based access: `mov rax, gs:[0]`.
    pub self_ref: *mut ProcessorControlRegion, // offset 0
    /// Core index (0 or 1). `mov eax, gs:[8]`.
    pub cpu_id: u32, // offset 8
    pub apic_id: u32,
    pub preempt_count: AtomicU32,
    pub in_interrupt: AtomicBool,
    pub reschedule_pending: AtomicBool,
    pub current_task: AtomicPtr<()>,
    pub scheduler: AtomicPtr<()>,
    pub online: AtomicBool,
    pub context_switches: AtomicU64,
    pub interrupt_count: AtomicU64,
}

// SAFETY: all mutable fields are atomics; non-atomic fields (self_ref,
// cpu_id, apic_id) are written once during per-core init before the core
// is marked online, and read-only thereafter.
unsafe impl Send for ProcessorControlRegion {}
unsafe impl Sync for ProcessorControlRegion {}

impl ProcessorControlRegion {
    pub const fn new() -> Self {
        Self {
            self_ref: ptr::null_mut(),
            cpu_id: 0,
            apic_id: 0,
            preempt_count: AtomicU32::new(0),
            in_interrupt: AtomicBool::new(false),
            reschedule_pending: AtomicBool::new(false),
            current_task: AtomicPtr::new(ptr::null_mut()),
            scheduler: AtomicPtr::new(ptr::null_mut()),
            online: AtomicBool::new(false),
            context_switches: AtomicU64::new(0),
            interrupt_count: AtomicU64::new(0),
        }
    }
}

static mut PCRS: [ProcessorControlRegion; MAX_CPUS] = [
    ProcessorControlRegion::new(),
    ProcessorControlRegion::new(),
];

static PCR_COUNT: AtomicU32 = AtomicU32::new(0);
static PCR_INIT: InitFlag = InitFlag::new();
static GS_BASE_SET: InitFlag = InitFlag::new();

/// Initialize and install the PCR for the bootstrap core (core 0).
///
/// # Safety
/// Must be called exactly once, before any other core is started.
pub unsafe fn init_bsp_pcr(apic_id: u32) {
    if !PCR_INIT.init_once() {
        return;
    }
    install_pcr(0, apic_id);
}

/// Initialize and install the PCR for the second core.
///
/// # Safety
/// Must be called exactly once, from the core being initialized.
pub unsafe fn init_ap_pcr(cpu_id: usize, apic_id: u32) -> *mut ProcessorControlRegion {
    assert!(cpu_id == 1, "this kernel supports exactly two cores");
    install_pcr(cpu_id, apic_id)
}

unsafe fn install_pcr(cpu_id: usize, apic_id: u32) -> *mut ProcessorControlRegion {
    let pcr = &raw mut PCRS[cpu_id];
    (*pcr).self_ref = pcr;
    (*pcr).cpu_id = cpu_id as u32;
    (*pcr).apic_id = apic_id;

    let addr = pcr as u64;
    write_msr(Msr::GS_BASE, addr);
    write_msr(Msr::KERNEL_GS_BASE, addr);
    GS_BASE_SET.init_once();

    let count = PCR_COUNT.load(Ordering::Acquire);
    if cpu_id as u32 >= count {
        PCR_COUNT.store(cpu_id as u32 + 1, Ordering::Release);
    }
    pcr
}

/// # Safety
/// `GS_BASE` must already point at a valid PCR for this core.
#[inline(always)]
pub unsafe fn current_pcr() -> &'static ProcessorControlRegion {
    let ptr: *mut ProcessorControlRegion;
    core::arch::asm!(
        "mov {}, gs:[0]",
        out(reg) ptr,
        options(nostack, preserves_flags, readonly)
    );
    &*ptr
}

/// # Safety
/// `GS_BASE` must already point at a valid PCR for this core; caller
/// ensures exclusive access.
#[inline(always)]
pub unsafe fn current_pcr_mut() -> &'static mut ProcessorControlRegion {
    let ptr: *mut ProcessorControlRegion;
    core::arch::asm!(
        "mov {}, gs:[0]",
        out(reg) ptr,
        options(nostack, preserves_flags, readonly)
    );
    &mut *ptr
}

#[inline(always)]
pub fn current_cpu_id() -> usize {
    if !GS_BASE_SET.is_set() {
        return 0;
    }
    unsafe {
        let id: u32;
        core::arch::asm!(
            "mov {:e}, gs:[8]",
            out(reg) id,
            options(nostack, preserves_flags, readonly)
        );
        id as usize
    }
}

#[inline]
pub fn get_current_cpu() -> usize {
    current_cpu_id()
}

pub fn get_pcr(cpu_id: usize) -> Option<&'static ProcessorControlRegion> {
    if cpu_id >= MAX_CPUS {
        return None;
    }
    // SAFETY: index is bounds-checked; PCRs are installed before use.
    Some(unsafe { &PCRS[cpu_id] })
}

/// # Safety
/// Caller ensures exclusive access to the target core's PCR.
pub unsafe fn get_pcr_mut(cpu_id: usize) -> Option<&'static mut ProcessorControlRegion> {
    if cpu_id >= MAX_CPUS {
        return None;
    }
    Some(unsafe { &mut PCRS[cpu_id] })
}

#[inline]
pub fn get_pcr_count() -> usize {
    PCR_COUNT.load(Ordering::Acquire) as usize
}

#[inline]
pub fn is_pcr_initialized() -> bool {
    PCR_INIT.is_set()
}

#[inline]
pub fn is_bsp() -> bool {
    current_cpu_id() == 0
}

#[inline]
pub fn mark_cpu_online(cpu_id: usize) {
    if let Some(pcr) = get_pcr(cpu_id) {
        pcr.online.store(true, Ordering::Release);
    }
}

#[inline]
pub fn mark_cpu_offline(cpu_id: usize) {
    if let Some(pcr) = get_pcr(cpu_id) {
        pcr.online.store(false, Ordering::Release);
    }
}

#[inline]
pub fn is_cpu_online(cpu_id: usize) -> bool {
    get_pcr(cpu_id).is_some_and(|p| p.online.load(Ordering::Acquire))
}

#[inline]
pub fn get_online_cpu_count() -> usize {
    (0..MAX_CPUS).filter(|&c| is_cpu_online(c)).count()
}

pub type SendIpiToCpuFn = fn(core: usize);

static SEND_IPI_FN: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

pub fn register_send_ipi_to_cpu_fn(f: SendIpiToCpuFn) {
    SEND_IPI_FN.store(f as *mut (), Ordering::Release);
}

/// Kick the target core so it re-enters the scheduler promptly. A no-op
/// until the platform registers an IPI sender.
pub fn send_ipi_to_cpu(core: usize) {
    let ptr = SEND_IPI_FN.load(Ordering::Acquire);
    if !ptr.is_null() {
        let f: SendIpiToCpuFn = unsafe { core::mem::transmute(ptr) };
        f(core);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcr_is_cache_line_aligned() {
        assert_eq!(core::mem::align_of::<ProcessorControlRegion>(), 64);
    }

    #[test]
    fn max_cpus_is_two() {
        assert_eq!(MAX_CPUS, 2);
    }
}
