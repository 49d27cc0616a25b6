//! Time management
//!
//! Tick bookkeeping and tick-based task delays. The periodic tick
//! interrupt drives [`os_tick_handler`]; [`tick_update`] is the testable
//! body that walks the sleeping list and decides on preemption.

use crate::config::CFG_SYSTICK_HZ;
use crate::core::kernel::{self, KernelState, KERNEL, KERNEL_STATE};
use crate::critical::{critical_section, is_isr_context};
use crate::kassert;
use crate::task::TcbPtr;
use crate::types::{tick_reached, TaskState, Tick};

/// Current tick count
#[inline]
pub fn now() -> Tick {
    KERNEL.tick_get()
}

/// Convert milliseconds to ticks
#[inline]
pub fn ms_to_ticks(ms: u32) -> Tick {
    ((ms as u64 * CFG_SYSTICK_HZ as u64) / 1000) as Tick
}

/// Delay the calling task for `ticks` system ticks.
///
/// The task moves from the ready list to the sleeping list; the tick
/// handler moves it back once its wake-up tick is reached.
pub fn delay(ticks: Tick) {
    if ticks == 0 {
        return;
    }
    kassert!(!is_isr_context(), "delay from ISR");
    let Some(cur) = kernel::current() else {
        return;
    };

    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);
        state.ready.remove(cur);
        // SAFETY: under the guard.
        unsafe {
            (*cur.as_ptr()).status = TaskState::Blocked;
            (*cur.as_ptr()).wake_tick = KERNEL.tick_get().wrapping_add(ticks);
        }
        state.sleeping.insert_by_wake(cur);
        crate::port::trigger_ctx_switch();
    });
}

/// Delay the calling task for (at least) `ms` milliseconds.
pub fn delay_ms(ms: u32) {
    delay(ms_to_ticks(ms));
}

/// One tick's worth of scheduler bookkeeping.
///
/// Decrements the running task's slice, wakes every sleeper whose
/// wake-up tick has been reached and reports whether the running task
/// should be preempted: either a woken task outranks it, or its slice is
/// spent and a same-priority peer is ready.
pub(crate) fn tick_update(state: &mut KernelState, cur: Option<TcbPtr>, now: Tick) -> bool {
    let mut preempt = false;

    if let Some(cur) = cur {
        // SAFETY: tick context runs with the guard held by the caller.
        let task = unsafe { &mut *cur.as_ptr() };
        if task.status == TaskState::Running && task.slice > 0 {
            task.slice -= 1;
        }
    }

    while let Some(sleeper) = state.sleeping.head() {
        // SAFETY: as above; short borrows around the list moves.
        let (wake_tick, pri) = {
            let task = unsafe { sleeper.as_ref() };
            (task.wake_tick, task.pri)
        };
        if !tick_reached(now, wake_tick) {
            break;
        }
        state.sleeping.remove(sleeper);
        unsafe { (*sleeper.as_ptr()).status = TaskState::Ready };
        state.ready.insert_by_prio(sleeper);

        if let Some(cur) = cur {
            if pri < unsafe { cur.as_ref() }.pri {
                preempt = true;
            }
        }
    }

    if let Some(cur) = cur {
        // SAFETY: as above.
        let task = unsafe { cur.as_ref() };
        if task.status == TaskState::Running && task.slice == 0 {
            let has_peer = state
                .ready
                .iter()
                .any(|t| t != cur && unsafe { t.as_ref() }.pri == task.pri);
            if has_peer {
                preempt = true;
            }
        }
    }

    preempt
}

/// Body of the periodic tick interrupt.
///
/// Increments the tick counter unconditionally; task bookkeeping only
/// happens once the scheduler is running.
pub fn os_tick_handler() {
    let now = KERNEL.tick_increment();
    if !KERNEL.is_running() {
        return;
    }

    let preempt =
        critical_section(|cs| tick_update(KERNEL_STATE.borrow_mut(cs), kernel::current(), now));

    if preempt {
        crate::port::trigger_ctx_switch();
    }
}

/// SysTick interrupt entry
#[cfg(target_arch = "arm")]
#[no_mangle]
pub extern "C" fn SysTick() {
    os_tick_handler();
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::boxed::Box;

    use super::*;
    use crate::config::CFG_TIME_SLICE;
    use crate::task::Tcb;
    use crate::types::Prior;
    use core::ptr::NonNull;

    fn leak_state() -> &'static mut KernelState {
        let state = Box::leak(Box::new(KernelState::new()));
        state.init();
        state
    }

    fn task(pri: Prior, status: TaskState, slice: Tick) -> TcbPtr {
        let tcb = Box::leak(Box::new(Tcb::new()));
        tcb.pri = pri;
        tcb.base_pri = pri;
        tcb.status = status;
        tcb.slice = slice;
        NonNull::from(tcb)
    }

    fn sleeper(state: &mut KernelState, pri: Prior, wake: Tick) -> TcbPtr {
        let tcb = task(pri, TaskState::Blocked, CFG_TIME_SLICE);
        unsafe { (*tcb.as_ptr()).wake_tick = wake };
        state.sleeping.insert_by_wake(tcb);
        tcb
    }

    #[test]
    fn due_sleepers_wake_in_order() {
        let state = leak_state();
        let cur = task(40, TaskState::Running, CFG_TIME_SLICE);
        state.ready.insert_by_prio(cur);
        let early = sleeper(state, 50, 10);
        let late = sleeper(state, 50, 20);

        assert!(!tick_update(state, Some(cur), 9));
        assert_eq!(state.sleeping.len(), 2);

        tick_update(state, Some(cur), 10);
        unsafe {
            assert_eq!(early.as_ref().status, TaskState::Ready);
            assert_eq!(late.as_ref().status, TaskState::Blocked);
        }

        tick_update(state, Some(cur), 20);
        unsafe { assert_eq!(late.as_ref().status, TaskState::Ready) };
        assert!(state.sleeping.is_empty());
    }

    #[test]
    fn woken_higher_priority_preempts() {
        let state = leak_state();
        let cur = task(40, TaskState::Running, CFG_TIME_SLICE);
        state.ready.insert_by_prio(cur);
        sleeper(state, 20, 100);

        assert!(!tick_update(state, Some(cur), 99));
        assert!(tick_update(state, Some(cur), 100));
    }

    #[test]
    fn woken_lower_priority_does_not_preempt() {
        let state = leak_state();
        let cur = task(40, TaskState::Running, CFG_TIME_SLICE);
        state.ready.insert_by_prio(cur);
        sleeper(state, 90, 5);

        assert!(!tick_update(state, Some(cur), 5));
    }

    #[test]
    fn slice_expiry_needs_a_peer_to_preempt() {
        let state = leak_state();
        let cur = task(32, TaskState::Running, 1);
        state.ready.insert_by_prio(cur);

        // Slice hits zero but nobody shares the band: no preemption.
        assert!(!tick_update(state, Some(cur), 1));
        assert_eq!(unsafe { cur.as_ref() }.slice, 0);

        // With an equal-priority peer ready, the next tick preempts.
        let peer = task(32, TaskState::Ready, CFG_TIME_SLICE);
        state.ready.insert_by_prio(peer);
        assert!(tick_update(state, Some(cur), 2));
    }

    #[test]
    fn sleeper_wakes_across_tick_wraparound() {
        let state = leak_state();
        let cur = task(40, TaskState::Running, CFG_TIME_SLICE);
        state.ready.insert_by_prio(cur);
        // Inserted at tick 0xFFFFFFFE with a 4 tick delay: wakes at 2.
        let wrap = sleeper(state, 50, 0xFFFF_FFFEu32.wrapping_add(4));

        assert!(!tick_update(state, Some(cur), 0xFFFF_FFFF));
        unsafe { assert_eq!(wrap.as_ref().status, TaskState::Blocked) };

        tick_update(state, Some(cur), 2);
        unsafe { assert_eq!(wrap.as_ref().status, TaskState::Ready) };
    }
}
