//! Error types for the MOS kernel
//!
//! Uses Rust's Result pattern instead of C-style error pointers.
//! Allocation failures are recoverable and returned to the caller;
//! saturation and caller-contract breaches are fatal and reported
//! through [`kassert!`](crate::kassert) instead.

/// Kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KernelError {
    /// No free stack page in the pool
    PoolExhausted,
    /// Live task count has reached the configured maximum
    TooManyTasks,
    /// Executor ready buffer or sleeper heap is saturated
    QueueFull,
    /// Coroutine frame exceeds the configured block size
    FrameTooLarge,
    /// Release by non-owner, recursive acquire of a non-recursive lock,
    /// or a yield with interrupts disabled
    BadCaller,
    /// Task name lookup failed
    NotFound,
}

/// Result type alias for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Whether the failure is recoverable by the caller
    #[inline]
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            KernelError::PoolExhausted | KernelError::TooManyTasks | KernelError::NotFound
        )
    }
}
