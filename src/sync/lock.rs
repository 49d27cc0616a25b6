//! Non-recursive lock
//!
//! A thin wrapper around a binary semaphore with an owner field. The
//! release path clears the owner before the `up`, so a freshly woken
//! waiter can never observe the lock as held by someone else.

use crate::core::kernel;
use crate::critical::{critical_section, Guarded};
use crate::kassert;
use crate::sync::sem::Semaphore;
use crate::task::TcbPtr;

/// Non-recursive lock
pub struct Lock {
    sema: Semaphore,
    owner: Guarded<Option<TcbPtr>>,
}

impl Lock {
    pub const fn new() -> Self {
        Lock {
            sema: Semaphore::new(1),
            owner: Guarded::new(None),
        }
    }

    /// Acquire the lock. Re-acquiring a lock the caller already holds is
    /// a caller error and asserts.
    pub fn acquire(&self) {
        let cur = kernel::current();
        let held_by_me = critical_section(|cs| {
            let owner = self.owner.borrow_mut(cs);
            owner.is_some() && *owner == cur
        });
        kassert!(!held_by_me, "recursive acquire of non-recursive lock");

        self.sema.down();
        critical_section(|cs| *self.owner.borrow_mut(cs) = cur);
    }

    /// Release the lock. Only the owner may release.
    pub fn release(&self) {
        let cur = kernel::current();
        let is_owner = critical_section(|cs| *self.owner.borrow_mut(cs) == cur);
        kassert!(is_owner, "lock released by non-owner");

        critical_section(|cs| *self.owner.borrow_mut(cs) = None);
        self.sema.up();
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}
