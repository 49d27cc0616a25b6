//! Port layer - CPU-specific entry points and intrinsics
//!
//! On ARM this is the Cortex-M4 port; elsewhere every intrinsic degrades
//! to a stub so the core logic can be exercised on the host.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

#[cfg(not(target_arch = "arm"))]
pub mod stub {
    use crate::types::{StkElement, TaskFn};

    /// No tick source on the host; tests drive the tick handler.
    pub fn systick_init(_reload: u32) {}

    /// Starting tasks requires the real port.
    ///
    /// # Safety
    /// Never sound on the host; present to keep callers compiling.
    pub unsafe fn start_first_task() -> ! {
        unimplemented!("context switching requires the ARM port")
    }

    /// No deferred switch on the host.
    pub fn trigger_ctx_switch() {}

    /// Busy hint instead of WFI.
    pub fn wait_for_interrupt() {
        core::hint::spin_loop();
    }

    /// No reset mechanism on the host.
    pub fn system_reset() -> ! {
        unimplemented!("system reset requires the ARM port")
    }

    /// No frame to build; hand back the aligned stack top.
    ///
    /// # Safety
    /// `stack_top` must be a valid one-past-the-end stack pointer.
    pub unsafe fn task_stack_init(
        _entry: TaskFn,
        _arg: *mut (),
        stack_top: *mut StkElement,
    ) -> *mut StkElement {
        (stack_top as usize & !7) as *mut StkElement
    }
}

#[cfg(not(target_arch = "arm"))]
pub use stub::*;
