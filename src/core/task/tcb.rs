//! Task Control Block (TCB) definition
//!
//! A TCB is constructed at the base of its stack page; the task stack
//! grows down from the page end. The layout of the first two fields is
//! load-bearing: the intrusive link pair sits at offset 0 (its `prev`
//! word doubles as the page pool's free marker) and the stack pointer at
//! offset 8, which is the one offset the context-switch assembly reads.

use core::ptr::NonNull;

use crate::core::list::ListHook;
use crate::types::{Prior, StkElement, TaskFn, TaskState, Tick};

/// Handle to a task
pub type TcbPtr = NonNull<Tcb>;

/// Task Control Block
#[repr(C)]
pub struct Tcb {
    /// Intrusive links for the at-most-one list this task is on.
    pub(crate) link: ListHook,

    /// Saved process stack pointer. Offset 8; read/written by the port.
    pub sp: *mut StkElement,

    /// Task name
    pub name: &'static str,

    /// Entry function
    pub entry: TaskFn,
    /// Argument passed to the entry function
    pub arg: *mut (),

    /// Static priority assigned at creation
    pub base_pri: Prior,
    /// Current priority, possibly boosted by priority inheritance
    pub pri: Prior,

    /// Lifecycle state
    pub status: TaskState,

    /// Remaining time slice in ticks
    pub slice: Tick,
    /// Absolute wake-up tick, meaningful only on the sleeping list
    pub wake_tick: Tick,
}

fn entry_unset(_: *mut ()) {}

impl Tcb {
    /// Create a blank TCB
    pub const fn new() -> Self {
        Tcb {
            link: ListHook::new(),
            sp: core::ptr::null_mut(),
            name: "",
            entry: entry_unset,
            arg: core::ptr::null_mut(),
            base_pri: 0,
            pri: 0,
            status: TaskState::Terminated,
            slice: 0,
            wake_tick: 0,
        }
    }

    /// Check if the task is ready or running
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self.status, TaskState::Ready | TaskState::Running)
    }

    /// Check if the task has been terminated
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.status == TaskState::Terminated
    }

    /// True iff an inheritance boost is currently active
    #[inline]
    pub fn is_boosted(&self) -> bool {
        self.pri != self.base_pri
    }
}

impl Default for Tcb {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: TCBs are only mutated within critical sections or from the
// context-switch interrupt.
unsafe impl Send for Tcb {}
unsafe impl Sync for Tcb {}
