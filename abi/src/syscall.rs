//! Service-call numbers (the kernel's trap-dispatch ABI).
//!
//! This is the single source of truth for the numbered service-call table
//! the dispatcher indexes into. Codes SUSPEND and WAIT require a saved
//! scheduler frame to block from; all others receive only the trap's
//! hardware frame.

pub const SVC_START: u64 = 0;
pub const SVC_CREATE: u64 = 1;
pub const SVC_YIELD: u64 = 2;
pub const SVC_TERMINATE: u64 = 3;
pub const SVC_SUSPEND: u64 = 4;
pub const SVC_RESUME: u64 = 5;
pub const SVC_WAIT: u64 = 6;
pub const SVC_WAKE: u64 = 7;
pub const SVC_PRIORITY: u64 = 8;

pub const SVC_TABLE_SIZE: usize = 9;

/// Futex wait/wake verbs, distinct from the service-call numbers above.
pub const FUTEX_WAIT: u32 = 0;
pub const FUTEX_WAKE: u32 = 1;

/// Futex flags (see `abi::task` futex value-word encoding doc).
pub const FUTEX_FLAG_CONTENTION_TRACKING: u32 = 1 << 0;
pub const FUTEX_FLAG_OWNER_TRACKING: u32 = 1 << 1;
pub const FUTEX_FLAG_PRIORITY_INHERITANCE: u32 = 1 << 2;

/// Cross-core IRQ proxy opcodes (bits 31..28 of the command word).
pub const IRQ_PROXY_OP_EXECUTE_FLASH: u32 = 0x1;
pub const IRQ_PROXY_OP_EXECUTE_SRAM: u32 = 0x2;
pub const IRQ_PROXY_OP_EVENT: u32 = 0x3;
pub const IRQ_PROXY_OP_PEND: u32 = 0x9;
pub const IRQ_PROXY_OP_CLEAR: u32 = 0xA;
pub const IRQ_PROXY_OP_ENABLE: u32 = 0xB;
pub const IRQ_PROXY_OP_DISABLE: u32 = 0xC;
pub const IRQ_PROXY_OP_SET_PRIORITY: u32 = 0xD;
pub const IRQ_PROXY_OP_UPDATE_CONFIG: u32 = 0xE;

/// Fixed offset added to IRQ numbers in the low 16 bits of the command word
/// so that IRQ 0 never collides with opcode 0 (EXECUTE_FLASH has no IRQ
/// number encoded, but a literal zero word must never be mistaken for one).
pub const IRQ_PROXY_NUMBER_OFFSET: u32 = 16;

/// Priority byte reserved for "real-time": routes through the NMI boost
/// mask instead of the normal interrupt controller.
pub const IRQ_PROXY_PRIORITY_REALTIME: u8 = 0xFF;
