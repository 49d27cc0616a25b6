//! Counting semaphore
//!
//! The classic P/V pair layered on task block/resume. Waiters queue in
//! priority order, so `up` always releases the highest-priority waiter.

use crate::core::kernel;
use crate::core::list::TcbList;
use crate::critical::{critical_section, test_irq, Guarded, IrqGuard};
use crate::kassert;
use crate::sched;
use crate::task;

struct SemInner {
    /// Negative count == number of waiters
    cnt: i32,
    waiting: TcbList,
}

/// Counting semaphore
pub struct Semaphore {
    inner: Guarded<SemInner>,
}

impl Semaphore {
    /// Create a semaphore with the given initial count
    pub const fn new(cnt: i32) -> Self {
        Semaphore {
            inner: Guarded::new(SemInner {
                cnt,
                waiting: TcbList::new(),
            }),
        }
    }

    /// Current count. Negative values count waiters.
    pub fn count(&self) -> i32 {
        critical_section(|cs| self.inner.borrow_mut(cs).cnt)
    }

    /// P operation: take one unit, blocking if none is available.
    pub fn down(&self) {
        kassert!(test_irq(), "down with interrupts disabled");
        critical_section(|cs| {
            let inner = self.inner.borrow_mut(cs);
            inner.cnt -= 1;
            if inner.cnt < 0 {
                if let Some(cur) = kernel::current() {
                    task::block_to(cur, &mut inner.waiting);
                    // Pended; the switch happens when the guard drops.
                    crate::port::trigger_ctx_switch();
                }
            }
        });
    }

    /// V operation: release one unit, waking the head waiter if any, and
    /// yield if a higher-priority task became ready.
    pub fn up(&self) {
        kassert!(test_irq(), "up with interrupts disabled");
        critical_section(|cs| {
            self.up_raw(cs);
            if sched::any_higher() {
                crate::port::trigger_ctx_switch();
            }
        });
    }

    /// V operation from interrupt context. No yield; the tick path
    /// raises the deferred switch instead.
    pub fn up_from_isr(&self) {
        critical_section(|cs| self.up_raw(cs));
    }

    fn up_raw(&self, cs: &IrqGuard) {
        let inner = self.inner.borrow_mut(cs);
        if inner.cnt < 0 {
            if let Some(head) = inner.waiting.head() {
                task::resume_from(head, &mut inner.waiting);
            }
        }
        inner.cnt += 1;
    }
}
