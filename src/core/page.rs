//! Stack page pool
//!
//! A pre-reserved array of fixed-size pages backs every task. The TCB
//! lives at the base of its page and the task stack grows down from the
//! page end. A page is free iff the first pointer-sized word, the TCB's
//! `prev` link slot, is null (never allocated) or the page's own address
//! (task terminated, hook self-linked).

use core::ptr::NonNull;

use crate::config::{CFG_PAGE_SIZE, CFG_POOL_SIZE};
use crate::task::Tcb;
use crate::types::StkElement;

/// One stack page. Alignment matches the strictest TCB field.
#[repr(C, align(8))]
pub struct Page {
    words: [StkElement; CFG_PAGE_SIZE],
}

impl Page {
    const fn new() -> Self {
        Page {
            words: [0; CFG_PAGE_SIZE],
        }
    }

    /// The TCB slot at the base of the page.
    #[inline]
    pub fn tcb(&mut self) -> *mut Tcb {
        (self as *mut Page).cast::<Tcb>()
    }

    /// One past the last word of the page; the initial stack frame is
    /// built just below this.
    #[inline]
    pub fn stack_top(&mut self) -> *mut StkElement {
        // SAFETY: one-past-the-end pointer of the page's own array.
        unsafe { self.words.as_mut_ptr().add(CFG_PAGE_SIZE) }
    }

    /// Lowest stack address a task may use without clobbering its TCB.
    #[inline]
    pub fn stack_limit(&mut self) -> *mut StkElement {
        let after_tcb = (core::mem::size_of::<Tcb>() + 3) / 4;
        // SAFETY: the TCB is far smaller than a page.
        unsafe { self.words.as_mut_ptr().add(after_tcb) }
    }

    /// Free predicate: consults the TCB's `prev` link slot.
    pub fn is_free(&self) -> bool {
        let base = (self as *const Page).cast::<*const ()>();
        // SAFETY: the page is at least pointer-aligned and the first
        // word(s) are always initialized (zeroed or a live hook).
        let prev = unsafe { base.read() };
        prev.is_null() || core::ptr::eq(prev, base.cast())
    }
}

/// Pre-reserved pool of stack pages.
pub struct PagePool {
    pages: [Page; CFG_POOL_SIZE],
}

impl PagePool {
    pub const fn new() -> Self {
        PagePool {
            pages: [const { Page::new() }; CFG_POOL_SIZE],
        }
    }

    /// Linearly scan for a free page. Must be called with interrupts
    /// disabled; the caller is expected to claim the page (by linking
    /// its TCB into a list) before releasing the guard.
    pub fn alloc(&mut self) -> Option<NonNull<Page>> {
        self.pages
            .iter_mut()
            .find(|p| p.is_free())
            .map(NonNull::from)
    }

    /// Number of currently free pages
    pub fn free_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_free()).count()
    }

    /// Iterate over the TCBs of all in-use pages.
    pub fn tasks(&mut self) -> impl Iterator<Item = NonNull<Tcb>> + '_ {
        self.pages.iter_mut().filter(|p| !p.is_free()).map(|p| {
            // SAFETY: a non-free page holds an initialized TCB at its base.
            unsafe { NonNull::new_unchecked(p.tcb()) }
        })
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::boxed::Box;

    use super::*;
    use crate::core::list::ListHook;

    #[test]
    fn fresh_pool_is_all_free() {
        let pool = Box::leak(Box::new(PagePool::new()));
        assert_eq!(pool.free_count(), CFG_POOL_SIZE);
        assert_eq!(pool.tasks().count(), 0);
    }

    #[test]
    fn linked_tcb_claims_page_and_self_link_releases_it() {
        let pool = Box::leak(Box::new(PagePool::new()));
        let mut page = pool.alloc().expect("pool is fresh");

        // A freshly written TCB has null links: the page still reads as
        // free until the task is linked somewhere.
        let tcb = unsafe { page.as_mut() }.tcb();
        unsafe { tcb.write(Tcb::new()) };
        assert_eq!(pool.free_count(), CFG_POOL_SIZE);

        // Link the TCB to an external hook: page now in use.
        let anchor = Box::leak(Box::new(ListHook::new()));
        unsafe { (*tcb).link.prev = anchor as *mut ListHook };
        assert_eq!(pool.free_count(), CFG_POOL_SIZE - 1);
        assert_eq!(pool.tasks().count(), 1);

        // Self-linking (what terminate does) recycles the page.
        unsafe { (*tcb).link.link_self() };
        assert_eq!(pool.free_count(), CFG_POOL_SIZE);
    }

    #[test]
    fn exhaustion_returns_none() {
        let pool = Box::leak(Box::new(PagePool::new()));
        let anchor = Box::leak(Box::new(ListHook::new()));
        for _ in 0..CFG_POOL_SIZE {
            let mut page = pool.alloc().expect("still free pages");
            let tcb = unsafe { page.as_mut() }.tcb();
            unsafe {
                tcb.write(Tcb::new());
                (*tcb).link.prev = anchor as *mut ListHook;
            }
        }
        assert!(pool.alloc().is_none());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn stack_bounds_are_inside_the_page() {
        let pool = Box::leak(Box::new(PagePool::new()));
        let mut page = pool.alloc().unwrap();
        let page = unsafe { page.as_mut() };
        let base = page.tcb() as usize;
        let limit = page.stack_limit() as usize;
        let top = page.stack_top() as usize;
        assert!(base < limit && limit < top);
        assert_eq!(top - base, CFG_PAGE_SIZE * 4);
    }
}
