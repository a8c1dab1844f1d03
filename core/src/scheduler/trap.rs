//! Interrupt/trap-exit glue: timer-tick handling and deferred reschedule.
//!
//! This kernel has no user mode, so there is no interrupt-frame-to-task
//! context copy here (kernel tasks are switched cooperatively via
//! `switch_asm::switch_registers`, never off an interrupt frame). What
//! remains is the "should we reschedule on the way out of this trap"
//! decision shared by the timer IRQ and the cross-core IRQ proxy doorbell.

use slopos_lib::InterruptFrame;
use slopos_lib::preempt::PreemptGuard;

use super::scheduler::{is_scheduling_active, schedule_from_trap_exit, scheduler_timer_tick};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RescheduleReason {
    TimerTick,
    InterruptWake,
    RescheduleIpi,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TrapExitSource {
    Irq,
    RescheduleIpi,
}

pub fn scheduler_request_reschedule(_reason: RescheduleReason) {
    if is_scheduling_active() {
        PreemptGuard::set_reschedule_pending();
    }
}

pub fn scheduler_request_reschedule_from_interrupt() {
    scheduler_request_reschedule(RescheduleReason::InterruptWake);
}

pub fn scheduler_handle_timer_interrupt(_frame: *mut InterruptFrame) {
    scheduler_timer_tick();
}

/// Called on the way out of any trap (IRQ or cross-core reschedule doorbell)
/// that might have made a higher-priority task ready. Switches immediately
/// unless preemption is currently disabled, in which case the pending flag
/// is left set and `PreemptGuard::drop` will fire the reschedule once the
/// last guard lifts.
pub fn scheduler_handoff_on_trap_exit(_source: TrapExitSource) {
    if PreemptGuard::is_active() {
        return;
    }
    if !PreemptGuard::is_reschedule_pending() {
        return;
    }
    if is_scheduling_active() {
        PreemptGuard::clear_reschedule_pending();
        schedule_from_trap_exit();
    }
}

pub fn scheduler_handle_post_irq() {
    scheduler_handoff_on_trap_exit(TrapExitSource::Irq);
}
