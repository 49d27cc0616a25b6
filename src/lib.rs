//! MOS - a small preemptive RTOS for ARM Cortex-M
//!
//! A real-time operating system kernel providing:
//! - Priority-based preemptive scheduling with round-robin fallback
//! - Synchronization primitives (semaphore, lock, priority-inheritance
//!   mutex, condition variable, barrier)
//! - Tick-based time management
//! - A cooperative async executor with stackless coroutines
//! - Context switching for ARM Cortex-M

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod port;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "exec")]
pub mod exec;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::critical;
pub use crate::core::error;
pub use crate::core::error::{KernelError, KernelResult};
pub use crate::core::kernel;
pub use crate::core::kernel::{current, os_init, os_start, tick_get};
pub use crate::core::page;
pub use crate::core::sched;
pub use crate::core::task;
pub use crate::core::time;
pub use crate::core::types;
pub use crate::core::types::*;

#[cfg(feature = "pac")]
pub use stm32_metapac as pac;
