//! Panic plumbing and fault handlers

#[cfg(all(feature = "defmt", target_arch = "arm"))]
use defmt_rtt as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
use panic_probe as _;

// With defmt, panic-probe has already printed the message; mask
// interrupts so the tick cannot switch away from the wreckage, then
// trap into the debugger.
#[cfg(all(feature = "defmt", target_arch = "arm"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::interrupt::disable();
    cortex_m::asm::udf()
}

// Without defmt there is nowhere to report to; park quietly.
#[cfg(all(not(feature = "defmt"), target_arch = "arm"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::bkpt();
    }
}

/// Name the task that took the fault before halting; the stacked pc
/// narrows down the offending instruction.
#[cfg(target_arch = "arm")]
#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    match crate::core::kernel::current() {
        Some(cur) => {
            // SAFETY: the current-task pointer is only ever installed
            // pointing at a live TCB.
            let task = unsafe { cur.as_ref() };
            crate::error!(
                "hard fault in '{}' (pri {}) pc={=u32:x}",
                task.name,
                task.pri,
                ef.pc()
            );
        }
        None => {
            crate::error!(
                "hard fault before the scheduler started, pc={=u32:x}",
                ef.pc()
            );
        }
    }

    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::udf();
    }
}

// Stamp log lines with the kernel tick
#[cfg(all(feature = "defmt", target_arch = "arm"))]
defmt::timestamp!("{=u32}", crate::time::now());
