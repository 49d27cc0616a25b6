//! Condition variable
//!
//! There is a small window between the unlock and the block where a
//! notification from another task can be lost; the wait loop retests the
//! predicate on every wakeup, which is the required mitigation.

use crate::core::kernel;
use crate::core::list::TcbList;
use crate::critical::{critical_section, Guarded};
use crate::sync::mutex::RawMutex;
use crate::task;

/// Condition variable
pub struct Condvar {
    waiting: Guarded<TcbList>,
}

impl Condvar {
    pub const fn new() -> Self {
        Condvar {
            waiting: Guarded::new(TcbList::new()),
        }
    }

    /// Whether any task is parked on this condition variable
    pub fn has_waiters(&self) -> bool {
        critical_section(|cs| !self.waiting.borrow_mut(cs).is_empty())
    }

    /// Release `mtx`, wait until `pred` holds, and reacquire `mtx`.
    ///
    /// Spurious wakeups are expected; the predicate decides.
    pub fn wait(&self, mtx: &RawMutex, mut pred: impl FnMut() -> bool) {
        mtx.unlock();
        while !pred() {
            critical_section(|cs| {
                if let Some(cur) = kernel::current() {
                    task::block_to(cur, self.waiting.borrow_mut(cs));
                    crate::port::trigger_ctx_switch();
                }
            });
        }
        mtx.lock();
    }

    /// Wake the head waiter, then yield.
    pub fn notify(&self) {
        critical_section(|cs| {
            let waiting = self.waiting.borrow_mut(cs);
            if let Some(head) = waiting.head() {
                task::resume_from(head, waiting);
            }
            crate::port::trigger_ctx_switch();
        });
    }

    /// Wake every waiter, then yield.
    pub fn notify_all(&self) {
        critical_section(|cs| {
            let waiting = self.waiting.borrow_mut(cs);
            while let Some(head) = waiting.head() {
                task::resume_from(head, waiting);
            }
            crate::port::trigger_ctx_switch();
        });
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
