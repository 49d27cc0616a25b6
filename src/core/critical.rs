//! Interrupt-disabled critical sections
//!
//! The interrupt guard is the only mutual-exclusion primitive available
//! to the kernel itself. Every kernel-global structure lives in a
//! [`Guarded`] cell and is mutated only while a guard is alive. On the
//! host there are no interrupts to mask; the guard degrades to a marker
//! so the core logic stays testable.

use core::cell::UnsafeCell;

/// RAII guard for critical sections
///
/// Disables interrupts on construction and restores the *previous*
/// interrupt state on drop, so guards nest freely.
pub struct IrqGuard {
    #[cfg(target_arch = "arm")]
    was_active: bool,
}

impl IrqGuard {
    /// Disable interrupts, remembering whether they were enabled.
    #[inline(always)]
    pub fn new() -> Self {
        #[cfg(target_arch = "arm")]
        {
            let was_active = cortex_m::register::primask::read().is_active();
            cortex_m::interrupt::disable();
            IrqGuard { was_active }
        }

        #[cfg(not(target_arch = "arm"))]
        {
            IrqGuard {}
        }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline(always)]
    fn drop(&mut self) {
        #[cfg(target_arch = "arm")]
        if self.was_active {
            // SAFETY: interrupts were enabled when the guard was taken.
            unsafe { cortex_m::interrupt::enable() };
        }
    }
}

/// Execute a closure with interrupts disabled
///
/// The closure receives a reference to the guard, which unlocks any
/// [`Guarded`] data for the duration of the section.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&IrqGuard) -> R,
{
    let guard = IrqGuard::new();
    f(&guard)
}

/// Check whether interrupts are currently enabled
#[inline]
pub fn test_irq() -> bool {
    #[cfg(target_arch = "arm")]
    {
        cortex_m::register::primask::read().is_active()
    }

    #[cfg(not(target_arch = "arm"))]
    {
        true
    }
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        // SAFETY: reading IPSR has no side effects.
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

/// Data that may only be touched while interrupts are masked.
///
/// The borrow is tied to the lifetime of the witnessing [`IrqGuard`],
/// so it cannot escape the critical section that produced it. Code
/// running where interrupts are masked by construction (the switch
/// interrupt) uses [`Guarded::borrow_unguarded`] instead.
pub struct Guarded<T> {
    inner: UnsafeCell<T>,
}

// SAFETY: on a single core, masking interrupts is exclusion; every
// borrow is witnessed by a guard or by interrupt context itself.
unsafe impl<T> Sync for Guarded<T> {}

impl<T> Guarded<T> {
    /// Wrap a value for guard-witnessed access.
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Guarded {
            inner: UnsafeCell::new(value),
        }
    }

    /// Borrow the contents for the duration of a critical section.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    pub fn borrow_mut<'g>(&'g self, _guard: &'g IrqGuard) -> &'g mut T {
        // SAFETY: the guard witnesses that interrupts are masked, and
        // the returned borrow cannot outlive it.
        unsafe { &mut *self.inner.get() }
    }

    /// Borrow the contents without a witnessing guard.
    ///
    /// # Safety
    /// Interrupts must already be masked (for example inside the
    /// deferred-switch interrupt), or no other context may be able to
    /// reach this cell.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    pub unsafe fn borrow_unguarded(&self) -> &mut T {
        unsafe { &mut *self.inner.get() }
    }

    /// Raw pointer to the contents
    #[inline(always)]
    pub const fn as_ptr(&self) -> *mut T {
        self.inner.get()
    }
}

/// critical-section implementation for ARM builds, so dependencies
/// share the kernel's masking discipline. Acquire leaks an [`IrqGuard`]
/// and hands its saved state out as the restore token; release rebuilds
/// the guard and lets its drop restore the saved state.
#[cfg(target_arch = "arm")]
mod cs_impl {
    use critical_section::{set_impl, Impl, RawRestoreState};

    use super::IrqGuard;

    struct KernelCriticalSection;
    set_impl!(KernelCriticalSection);

    unsafe impl Impl for KernelCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let guard = IrqGuard::new();
            let was_active = guard.was_active;
            core::mem::forget(guard);
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            drop(IrqGuard { was_active });
        }
    }
}
