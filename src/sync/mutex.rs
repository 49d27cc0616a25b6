//! Recursive mutex with priority inheritance
//!
//! On contention the owner's current priority is boosted pairwise to the
//! highest waiting priority, bounding priority inversion. Release
//! transfers ownership directly to the highest-priority waiter while
//! interrupts are disabled, so a third task can never steal the mutex
//! between the release and the waiter's wakeup.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::core::kernel;
use crate::core::list::TcbList;
use crate::critical::{critical_section, test_irq, Guarded};
use crate::kassert;
use crate::sched;
use crate::task::{self, TcbPtr};

struct MutexInner {
    /// Semaphore-style count; negative == waiters queued
    cnt: i32,
    recursion: u32,
    owner: Option<TcbPtr>,
    /// Waiters in current-priority order, highest first
    waiting: TcbList,
}

/// Priority-inheritance mutex without a payload.
///
/// This is the primitive the condition variable and barrier build on;
/// most task code wants the data-carrying [`Mutex`] instead.
pub struct RawMutex {
    inner: Guarded<MutexInner>,
}

impl RawMutex {
    pub const fn new() -> Self {
        RawMutex {
            inner: Guarded::new(MutexInner {
                cnt: 1,
                recursion: 0,
                owner: None,
                waiting: TcbList::new(),
            }),
        }
    }

    /// Acquire the mutex, blocking while another task owns it.
    /// Recursive acquisition by the owner just bumps the counter.
    pub fn lock(&self) {
        kassert!(test_irq(), "lock with interrupts disabled");
        critical_section(|cs| {
            let inner = self.inner.borrow_mut(cs);
            let cur = kernel::current();

            if inner.owner.is_some() && inner.owner == cur {
                inner.recursion += 1;
                return;
            }

            inner.cnt -= 1;
            if inner.cnt >= 0 {
                inner.owner = cur;
                inner.recursion = 1;
                return;
            }

            // Contended. Boost the owner to the caller's priority if the
            // caller outranks it, then wait in priority order.
            if let Some(cur) = cur {
                if let Some(owner) = inner.owner {
                    // SAFETY: under the guard.
                    let cur_pri = unsafe { cur.as_ref() }.pri;
                    if cur_pri < unsafe { owner.as_ref() }.pri {
                        task::set_pri(owner, cur_pri);
                    }
                }
                task::block_to(cur, &mut inner.waiting);
                crate::port::trigger_ctx_switch();
            }
        });
        // On return from the switch, ownership has been transferred to
        // this task by the releasing owner.
    }

    /// Release the mutex. Only the owner may release; the outermost
    /// release restores the owner's static priority and hands the mutex
    /// to the highest-priority waiter.
    pub fn unlock(&self) {
        kassert!(test_irq(), "unlock with interrupts disabled");
        critical_section(|cs| {
            let inner = self.inner.borrow_mut(cs);
            let cur = kernel::current();
            kassert!(inner.owner == cur, "mutex released by non-owner");

            if inner.recursion > 1 {
                inner.recursion -= 1;
                return;
            }
            inner.recursion = 0;

            if let Some(cur) = cur {
                // SAFETY: under the guard.
                let base = unsafe { cur.as_ref() }.base_pri;
                task::set_pri(cur, base);
            }

            if let Some(next) = inner.waiting.head() {
                task::resume_from(next, &mut inner.waiting);
                inner.owner = Some(next);
                inner.recursion = 1;
                inner.cnt += 1;

                if sched::any_higher() {
                    crate::port::trigger_ctx_switch();
                }
            } else {
                inner.owner = None;
                inner.cnt += 1;
            }
        });
    }

    /// Run a closure while holding the mutex.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        self.lock();
        let ret = f();
        self.unlock();
        ret
    }

    /// Whether some task currently owns the mutex
    pub fn is_owned(&self) -> bool {
        critical_section(|cs| self.inner.borrow_mut(cs).owner.is_some())
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Priority-inheritance mutex protecting a value of type `T`.
pub struct Mutex<T> {
    raw: RawMutex,
    data: UnsafeCell<T>,
}

// SAFETY: the raw mutex serializes access to the payload.
unsafe impl<T: Send> Sync for Mutex<T> {}
unsafe impl<T: Send> Send for Mutex<T> {}

impl<T> Mutex<T> {
    pub const fn new(data: T) -> Self {
        Mutex {
            raw: RawMutex::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the mutex for the guard's lifetime.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.raw.lock();
        MutexGuard { mtx: self }
    }

    /// The underlying raw mutex, for use with a condition variable.
    pub fn raw(&self) -> &RawMutex {
        &self.raw
    }
}

/// Scoped mutex acquisition: acquires on construction, releases on every
/// scope exit.
pub struct MutexGuard<'a, T> {
    mtx: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves ownership of the mutex.
        unsafe { &*self.mtx.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above.
        unsafe { &mut *self.mtx.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mtx.raw.unlock();
    }
}
