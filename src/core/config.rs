//! Compile-time configuration for the MOS kernel
//!
//! These constants control the behavior and resource limits of the RTOS.

use crate::types::{Prior, Tick};

/// Maximum number of live tasks
pub const CFG_MAX_TASK_NUM: usize = 16;

/// Number of stack pages in the pre-reserved pool
pub const CFG_POOL_SIZE: usize = 16;

/// Stack page size in 32-bit words
pub const CFG_PAGE_SIZE: usize = 1024;

/// System tick rate in Hz
pub const CFG_SYSTICK_HZ: u32 = 1000;

/// Core clock used to program the SysTick reload value
pub const CFG_SYSCLK_HZ: u32 = 16_000_000;

/// Highest task priority
pub const CFG_PRI_MAX: Prior = 0;

/// Lowest task priority
pub const CFG_PRI_MIN: Prior = 127;

/// Time slice width in ticks
pub const CFG_TIME_SLICE: Tick = 50;

/// Scheduler policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// Strict priority preemption, round-robin inside a priority band
    PreemptPri,
    /// Round-robin over the whole ready list on slice expiry
    RoundRobin,
}

/// Selected scheduler policy
pub const CFG_SCHED_POLICY: SchedPolicy = SchedPolicy::PreemptPri;

/// Executor ready-queue capacity (per buffer)
pub const CFG_ASYNC_QUEUE_CAP: usize = 256;

/// Captured-object size of an executor lambda in bytes
pub const CFG_ASYNC_LAMBDA_SIZE: usize = 32;

/// Sleeper heap capacity
pub const CFG_ASYNC_SLEEPER_CAP: usize = 256;

/// Coroutine frame block size in bytes
pub const CFG_ASYNC_FRAME_SIZE: usize = 128;

/// Coroutine frame pool capacity
pub const CFG_ASYNC_POOL_CAP: usize = 200;
