//! Scheduler decision
//!
//! Strict priority preemption with round-robin inside a priority band.
//! [`pick_next`] is the decision function proper, written against the
//! state aggregate so it can be exercised on the host; [`next_tcb`] is
//! the symbol the context-switch interrupt calls.

use crate::config::{SchedPolicy, CFG_SCHED_POLICY, CFG_TIME_SLICE};
use crate::core::kernel::{self, KernelState, KERNEL_STATE};
use crate::critical::critical_section;
use crate::task::TcbPtr;
use crate::types::TaskState;

/// Pick the task to run next and update statuses accordingly.
///
/// `prev` is the task that was running when the switch was requested; it
/// may have blocked or terminated in the meantime. The head of the ready
/// list wins. If the head's slice is exhausted and it shares a priority
/// band with `prev`, the head is rotated to the tail of its band (with a
/// fresh quantum) and the new head wins instead.
pub(crate) fn pick_next(state: &mut KernelState, prev: Option<TcbPtr>) -> Option<TcbPtr> {
    let mut chosen = state.ready.head()?;

    if let Some(prev) = prev {
        // SAFETY: interrupts are disabled; we have exclusive access. The
        // borrows are kept short because prev and the head may be the
        // same task.
        let (prev_pri, prev_terminated) = unsafe {
            let prev_ref = &mut *prev.as_ptr();
            if prev_ref.status == TaskState::Running {
                prev_ref.status = TaskState::Ready;
            }
            (prev_ref.pri, prev_ref.is_terminated())
        };

        let rotate = {
            let head = unsafe { chosen.as_ref() };
            let expired = head.slice == 0;
            match CFG_SCHED_POLICY {
                SchedPolicy::PreemptPri => expired && !prev_terminated && head.pri == prev_pri,
                SchedPolicy::RoundRobin => expired,
            }
        };

        if rotate {
            state.ready.remove(chosen);
            unsafe { (*chosen.as_ptr()).slice = CFG_TIME_SLICE };
            match CFG_SCHED_POLICY {
                // Tail of its own priority band
                SchedPolicy::PreemptPri => state.ready.insert_by_prio(chosen),
                // Tail of the whole list
                SchedPolicy::RoundRobin => state.ready.push_back(chosen),
            }
            chosen = state.ready.head()?;
        }
    }

    // SAFETY: as above.
    unsafe {
        let chosen_ref = &mut *chosen.as_ptr();
        if chosen_ref.slice == 0 {
            chosen_ref.slice = CFG_TIME_SLICE;
        }
        chosen_ref.status = TaskState::Running;
    }
    Some(chosen)
}

/// Scheduler decision entry, called from the deferred-switch interrupt
/// after the outgoing context has been saved.
///
/// # Safety
/// Must only run with interrupts disabled (the switch interrupt
/// establishes this); reads and writes the current-task pointer.
#[no_mangle]
pub unsafe extern "C" fn next_tcb() {
    // SAFETY: the deferred-switch interrupt runs with interrupts masked.
    let state = unsafe { KERNEL_STATE.borrow_unguarded() };
    let prev = kernel::current();
    if let Some(next) = pick_next(state, prev) {
        unsafe { kernel::set_current(Some(next)) };
    }
}

/// True iff some ready task has a higher current priority than the
/// running task.
pub fn any_higher() -> bool {
    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);
        match (state.ready.head(), kernel::current()) {
            (Some(head), Some(cur)) if head != cur => {
                // SAFETY: under the guard.
                unsafe { head.as_ref().pri < cur.as_ref().pri }
            }
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::boxed::Box;

    use super::*;
    use crate::task::Tcb;
    use crate::types::Prior;
    use core::ptr::NonNull;

    fn leak_state() -> &'static mut KernelState {
        let state = Box::leak(Box::new(KernelState::new()));
        state.init();
        state
    }

    fn ready_task(state: &mut KernelState, pri: Prior, slice: u32) -> TcbPtr {
        let tcb = Box::leak(Box::new(Tcb::new()));
        tcb.pri = pri;
        tcb.base_pri = pri;
        tcb.slice = slice;
        tcb.status = TaskState::Ready;
        let ptr = NonNull::from(tcb);
        state.ready.insert_by_prio(ptr);
        ptr
    }

    #[test]
    fn highest_priority_wins() {
        let state = leak_state();
        let low = ready_task(state, 40, 10);
        let high = ready_task(state, 20, 10);

        let picked = pick_next(state, Some(low)).unwrap();
        assert_eq!(picked, high);
        unsafe {
            assert_eq!(picked.as_ref().status, TaskState::Running);
            assert_eq!(low.as_ref().status, TaskState::Ready);
        }
    }

    #[test]
    fn expired_slice_rotates_within_band() {
        let state = leak_state();
        let a = ready_task(state, 32, 0); // just expired
        let b = ready_task(state, 32, CFG_TIME_SLICE);
        unsafe { (*a.as_ptr()).status = TaskState::Running };

        let picked = pick_next(state, Some(a)).unwrap();
        assert_eq!(picked, b);
        unsafe {
            // The rotated task sits behind its peer with a fresh quantum.
            assert_eq!(a.as_ref().slice, CFG_TIME_SLICE);
            assert_eq!(a.as_ref().status, TaskState::Ready);
        }
        let order: std::vec::Vec<_> = state.ready.iter().collect();
        assert_eq!(order, [b, a]);
    }

    #[test]
    fn expired_slice_without_peer_keeps_running() {
        let state = leak_state();
        let solo = ready_task(state, 32, 0);
        unsafe { (*solo.as_ptr()).status = TaskState::Running };

        let picked = pick_next(state, Some(solo)).unwrap();
        assert_eq!(picked, solo);
        unsafe {
            assert_eq!(picked.as_ref().status, TaskState::Running);
            assert_eq!(picked.as_ref().slice, CFG_TIME_SLICE);
        }
    }

    #[test]
    fn blocked_prev_is_skipped() {
        let state = leak_state();
        let blocked = Box::leak(Box::new(Tcb::new()));
        blocked.pri = 10;
        blocked.status = TaskState::Blocked;
        let blocked = NonNull::from(blocked);
        let next = ready_task(state, 64, 10);

        let picked = pick_next(state, Some(blocked)).unwrap();
        assert_eq!(picked, next);
        unsafe { assert_eq!(blocked.as_ref().status, TaskState::Blocked) };
    }

    #[test]
    fn empty_ready_list_picks_nothing() {
        let state = leak_state();
        assert_eq!(pick_next(state, None), None);
    }
}
