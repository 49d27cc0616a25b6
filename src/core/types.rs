//! Core type definitions for the MOS kernel
//!
//! These types provide strong typing for kernel primitives.

/// Task priority (0 = highest, 127 = lowest)
pub type Prior = u8;

/// Tick counter type
pub type Tick = u32;

/// Stack element type
pub type StkElement = u32;

/// Task entry point. A task that returns falls into the exit trampoline
/// and is terminated.
pub type TaskFn = fn(*mut ());

/// Task state
///
/// The state always reflects which list the TCB currently belongs to:
/// `Ready`/`Running` tasks sit in the ready list, `Blocked` tasks in the
/// sleeping list or some wait list, `Terminated` tasks in no list at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Task is in the ready list, waiting for the processor
    Ready = 0,
    /// Task is the one currently executing
    Running = 1,
    /// Task is parked on a wait list or the sleeping list
    Blocked = 2,
    /// Task is dead and its page has been recycled
    Terminated = 3,
}

impl TaskState {
    /// Short display name for diagnostics
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Ready => "READY",
            TaskState::Running => "RUNNING",
            TaskState::Blocked => "BLOCKED",
            TaskState::Terminated => "TERMINATED",
        }
    }
}

/// Wrap-aware tick comparison: true iff `a` is at or after `b` modulo
/// 2^32, assuming the two are within half the tick range of each other.
#[inline]
pub fn tick_reached(a: Tick, b: Tick) -> bool {
    a.wrapping_sub(b) as i32 >= 0
}
