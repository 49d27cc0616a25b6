//! Logging and assertion macros for MOS
//!
//! Logging goes through defmt when the feature is enabled and compiles
//! to nothing otherwise. `kassert!` is the kernel's fatal-assertion
//! mechanism: invariant breaches and saturation abort here.

/// Debug message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

/// Info message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { defmt::info!($($arg)*) };
}

/// Error message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}

/// Trace message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}

/// Warning message
#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}

// No-op versions when defmt is disabled; arguments are still evaluated
// so the call sites stay warning-free.
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! debug { ($($arg:tt)*) => { { let _ = ($($arg)*); } }; }
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! info { ($($arg:tt)*) => { { let _ = ($($arg)*); } }; }
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! error { ($($arg:tt)*) => { { let _ = ($($arg)*); } }; }
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! trace { ($($arg:tt)*) => { { let _ = ($($arg)*); } }; }
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! warn { ($($arg:tt)*) => { { let _ = ($($arg)*); } }; }

/// Kernel assertion
///
/// With the `assert` feature (default) a failed condition logs the
/// message and panics, halting execution. Without it the failure is only
/// logged and the caller continues, so release images can choose to limp
/// on instead of faulting.
#[cfg(feature = "assert")]
#[macro_export]
macro_rules! kassert {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            $crate::error!($($msg)*);
            panic!($($msg)*);
        }
    };
}

#[cfg(not(feature = "assert"))]
#[macro_export]
macro_rules! kassert {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            $crate::error!($($msg)*);
        }
    };
}
