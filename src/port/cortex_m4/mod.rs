//! Cortex-M4 port
//!
//! The only module that touches hardware registers, FPU state or the
//! exception-return mechanism. The first task is entered through the
//! supervisor call; context switches run in PendSV at the lowest
//! exception priority, so they only execute once every higher interrupt
//! has returned. With the `fpu` feature the handlers save and restore
//! S16-S31 conditionally on bit 4 of EXC_RETURN.

#![allow(named_asm_labels)]

use core::arch::naked_asm;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;

use crate::types::{StkElement, TaskFn};

/// Program the SysTick timer for periodic tick generation.
pub fn systick_init(reload: u32) {
    // SAFETY: single-core startup path; nobody else owns the SYST yet.
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(reload - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Enter the first task through the supervisor call. Never returns.
///
/// # Safety
/// `CUR_TCB` must point at a TCB whose stack holds a valid initial
/// frame.
pub unsafe fn start_first_task() -> ! {
    // SAFETY: startup path, exclusive peripheral access.
    unsafe {
        let mut p = cortex_m::Peripherals::steal();
        // Deferred switch at the very bottom of the exception ladder.
        p.SCB.set_priority(SystemHandler::PendSV, 0xF0);
        p.SCB.set_priority(SystemHandler::SysTick, 0xE0);

        core::arch::asm!("svc 0", options(noreturn));
    }
}

/// Pend the deferred-switch interrupt.
#[inline(always)]
pub fn trigger_ctx_switch() {
    cortex_m::peripheral::SCB::set_pendsv();
}

/// Halt the processor until the next interrupt.
#[inline(always)]
pub fn wait_for_interrupt() {
    cortex_m::asm::wfi();
}

/// Reset the system.
pub fn system_reset() -> ! {
    cortex_m::peripheral::SCB::sys_reset()
}

/// Initial stack frame: the software-saved words the switch handler
/// pops, followed by the hardware exception frame.
#[repr(C)]
struct InitFrame {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    /// EXC_RETURN: thread mode, PSP, no FP context
    exc_return: u32,
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}

const INIT_FRAME_WORDS: usize = 17;

/// Build the initial frame so the first context restore resumes at
/// `entry(arg)`, with the exit trampoline as the return address.
///
/// # Safety
/// `stack_top` must be the one-past-the-end pointer of a stack area
/// large enough for the frame.
pub unsafe fn task_stack_init(
    entry: TaskFn,
    arg: *mut (),
    stack_top: *mut StkElement,
) -> *mut StkElement {
    unsafe {
        let top = (stack_top as usize & !7) as *mut StkElement;
        let frame = top.sub(INIT_FRAME_WORDS).cast::<InitFrame>();

        frame.write(InitFrame {
            r4: 0x0404_0404,
            r5: 0x0505_0505,
            r6: 0x0606_0606,
            r7: 0x0707_0707,
            r8: 0x0808_0808,
            r9: 0x0909_0909,
            r10: 0x1010_1010,
            r11: 0x1111_1111,
            exc_return: 0xFFFF_FFFD,
            r0: arg as u32,
            r1: 0,
            r2: 0,
            r3: 0,
            r12: 0,
            lr: crate::core::task::task_exit as usize as u32,
            pc: (entry as usize as u32) | 1,
            xpsr: 0x0100_0000,
        });

        frame.cast::<StkElement>()
    }
}

/// Supervisor-call entry: restore the first task's context.
#[cfg(feature = "fpu")]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn SVCall() {
    naked_asm!(
        "cpsid   i",
        "ldr     r3, ={cur}",
        "ldr     r1, [r3]",
        "ldr     r0, [r1, #8]",
        "ldmia   r0!, {{r4-r11, lr}}",
        "tst     lr, #0x10",
        "it      eq",
        "vldmiaeq r0!, {{s16-s31}}",
        "msr     psp, r0",
        "mov     r0, #0",
        "cpsie   i",
        "bx      lr",
        cur = sym crate::core::kernel::CUR_TCB,
    );
}

#[cfg(not(feature = "fpu"))]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn SVCall() {
    naked_asm!(
        "cpsid   i",
        "ldr     r3, ={cur}",
        "ldr     r1, [r3]",
        "ldr     r0, [r1, #8]",
        "ldmia   r0!, {{r4-r11, lr}}",
        "msr     psp, r0",
        "mov     r0, #0",
        "cpsie   i",
        "bx      lr",
        cur = sym crate::core::kernel::CUR_TCB,
    );
}

/// Deferred-switch entry: save the outgoing context, let the scheduler
/// pick the next task, restore its context.
#[cfg(feature = "fpu")]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid   i",
        "mrs     r0, psp",
        "tst     lr, #0x10",
        "it      eq",
        "vstmdbeq r0!, {{s16-s31}}",
        "ldr     r3, ={cur}",
        "ldr     r2, [r3]",
        "stmdb   r0!, {{r4-r11, lr}}",
        "str     r0, [r2, #8]",
        "stmdb   sp!, {{r3, lr}}",
        "bl      {next}",
        "ldmia   sp!, {{r3, lr}}",
        "ldr     r1, [r3]",
        "ldr     r0, [r1, #8]",
        "ldmia   r0!, {{r4-r11, lr}}",
        "tst     lr, #0x10",
        "it      eq",
        "vldmiaeq r0!, {{s16-s31}}",
        "msr     psp, r0",
        "cpsie   i",
        "dsb",
        "isb",
        "bx      lr",
        cur = sym crate::core::kernel::CUR_TCB,
        next = sym crate::core::sched::next_tcb,
    );
}

#[cfg(not(feature = "fpu"))]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid   i",
        "mrs     r0, psp",
        "ldr     r3, ={cur}",
        "ldr     r2, [r3]",
        "stmdb   r0!, {{r4-r11, lr}}",
        "str     r0, [r2, #8]",
        "stmdb   sp!, {{r3, lr}}",
        "bl      {next}",
        "ldmia   sp!, {{r3, lr}}",
        "ldr     r1, [r3]",
        "ldr     r0, [r1, #8]",
        "ldmia   r0!, {{r4-r11, lr}}",
        "msr     psp, r0",
        "cpsie   i",
        "dsb",
        "isb",
        "bx      lr",
        cur = sym crate::core::kernel::CUR_TCB,
        next = sym crate::core::sched::next_tcb,
    );
}
