//! Task management
//!
//! Task creation, termination, blocking and unblocking. Everything here
//! funnels through the kernel state aggregate under the interrupt guard;
//! the actual switch is always deferred to the low-priority switch
//! interrupt via the port layer.

mod tcb;

pub use tcb::{Tcb, TcbPtr};

use core::ptr::NonNull;

use crate::config::{CFG_MAX_TASK_NUM, CFG_PRI_MIN, CFG_TIME_SLICE};
use crate::core::kernel::{self, KERNEL, KERNEL_STATE};
use crate::core::list::{self, TcbList};
use crate::critical::{critical_section, test_irq};
use crate::error::{KernelError, KernelResult};
use crate::kassert;
use crate::types::{Prior, TaskFn, TaskState};

/// Create a new task
///
/// Allocates a stack page, constructs the TCB and initial frame inside
/// it, and inserts the task into the ready list. If the scheduler is
/// running and the new task outranks the current one, a switch is
/// requested.
///
/// # Errors
/// * [`KernelError::TooManyTasks`] - live task count is at the cap
/// * [`KernelError::PoolExhausted`] - no free stack page
pub fn create(
    entry: TaskFn,
    arg: *mut (),
    pri: Prior,
    name: &'static str,
) -> KernelResult<TcbPtr> {
    kassert!(pri <= CFG_PRI_MIN, "priority out of range");

    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);

        if state.task_count >= CFG_MAX_TASK_NUM {
            return Err(KernelError::TooManyTasks);
        }
        let mut page = state.pool.alloc().ok_or(KernelError::PoolExhausted)?;

        // SAFETY: the page is free, pointer-aligned and large enough for
        // a TCB plus the initial frame; we hold the interrupt guard.
        let tcb = unsafe {
            let page = page.as_mut();
            let tcb_ptr = page.tcb();
            tcb_ptr.write(Tcb::new());

            let tcb = &mut *tcb_ptr;
            tcb.name = name;
            tcb.entry = entry;
            tcb.arg = arg;
            tcb.base_pri = pri;
            tcb.pri = pri;
            tcb.status = TaskState::Ready;
            tcb.slice = CFG_TIME_SLICE;
            tcb.sp = crate::port::task_stack_init(entry, arg, page.stack_top());

            NonNull::new_unchecked(tcb_ptr)
        };

        // Linking the TCB is what claims the page.
        state.ready.insert_by_prio(tcb);
        state.task_count += 1;

        if KERNEL.is_running() {
            if let Some(cur) = kernel::current() {
                // SAFETY: under the guard.
                if pri < unsafe { cur.as_ref() }.pri {
                    crate::port::trigger_ctx_switch();
                }
            }
        }

        Ok(tcb)
    })
}

/// Terminate a task
///
/// Unlinks the task from whatever list it is on and recycles its stack
/// page (the self-linked hook is the pool's free marker). Terminating
/// the current task triggers a switch that never returns. Terminating an
/// already-terminated task is a no-op.
pub fn terminate(tcb: TcbPtr) {
    let is_self = kernel::current() == Some(tcb);

    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);
        // SAFETY: under the guard; borrows are kept short around the
        // list operations.
        let (terminated, linked) = unsafe {
            let task = tcb.as_ref();
            (task.is_terminated(), list::is_linked(task))
        };
        if terminated {
            return;
        }
        if linked {
            list::unlink(tcb);
        } else {
            unsafe { (*tcb.as_ptr()).link.link_self() };
        }
        unsafe { (*tcb.as_ptr()).status = TaskState::Terminated };
        state.task_count -= 1;
    });

    if is_self {
        crate::port::trigger_ctx_switch();
        // The pended switch fires as soon as this context ends.
        loop {
            crate::port::wait_for_interrupt();
        }
    }
}

/// Move a task from the ready list to the generic blocked list.
///
/// Blocking the current task requests a switch. Blocking a terminated
/// or already-blocked task is a no-op.
pub fn block(tcb: TcbPtr) {
    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);
        // SAFETY: under the guard.
        let status = unsafe { tcb.as_ref() }.status;
        if !matches!(status, TaskState::Ready | TaskState::Running) {
            return;
        }
        state.ready.remove(tcb);
        unsafe { (*tcb.as_ptr()).status = TaskState::Blocked };
        state.blocked.insert_by_prio(tcb);

        if status == TaskState::Running {
            crate::port::trigger_ctx_switch();
        }
    });
}

/// Move a blocked task back to the ready list.
///
/// Requests a switch if the resumed task outranks the running one.
/// Resuming a terminated or already-ready task is a no-op.
pub fn resume(tcb: TcbPtr) {
    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);
        // SAFETY: under the guard.
        let (status, pri) = {
            let task = unsafe { tcb.as_ref() };
            (task.status, task.pri)
        };
        if status != TaskState::Blocked {
            return;
        }
        list::unlink(tcb);
        unsafe { (*tcb.as_ptr()).status = TaskState::Ready };
        state.ready.insert_by_prio(tcb);

        if let Some(cur) = kernel::current() {
            if pri < unsafe { cur.as_ref() }.pri {
                crate::port::trigger_ctx_switch();
            }
        }
    });
}

/// Move a task onto a caller-supplied wait list, in priority order.
///
/// Used by the synchronization primitives. The caller must hold the
/// interrupt guard and follow up with a yield if it blocked itself.
pub fn block_to(tcb: TcbPtr, wait_list: &mut TcbList) {
    // SAFETY: caller holds the guard.
    let (terminated, linked) = unsafe {
        let task = tcb.as_ref();
        (task.is_terminated(), list::is_linked(task))
    };
    if terminated {
        return;
    }
    if linked {
        list::unlink(tcb);
    }
    unsafe { (*tcb.as_ptr()).status = TaskState::Blocked };
    wait_list.insert_by_prio(tcb);
}

/// Remove a task from a wait list and make it ready, preserving the
/// ready list's priority order.
///
/// The caller must hold the interrupt guard.
pub fn resume_from(tcb: TcbPtr, wait_list: &mut TcbList) {
    // SAFETY: caller holds the guard.
    if unsafe { tcb.as_ref() }.is_terminated() {
        return;
    }
    wait_list.remove(tcb);
    unsafe { (*tcb.as_ptr()).status = TaskState::Ready };
    // SAFETY: the guard is held, so the unchecked access is exclusive.
    let state = unsafe { KERNEL_STATE.borrow_unguarded() };
    state.ready.insert_by_prio(tcb);
}

/// Give up the processor voluntarily.
///
/// Returns once the scheduler re-selects the caller.
pub fn yield_now() {
    kassert!(test_irq(), "yield with interrupts disabled");
    crate::port::trigger_ctx_switch();
}

/// Change a task's current priority, keeping the ready list ordered.
///
/// The caller must hold the interrupt guard. Wait-list positions are not
/// revisited; a boost takes effect there on the next wakeup.
pub(crate) fn set_pri(tcb: TcbPtr, pri: Prior) {
    // SAFETY: caller holds the guard.
    let (old_pri, ready) = {
        let task = unsafe { tcb.as_ref() };
        (task.pri, task.is_ready())
    };
    if old_pri == pri {
        return;
    }
    if ready {
        let state = unsafe { KERNEL_STATE.borrow_unguarded() };
        state.ready.remove(tcb);
        unsafe { (*tcb.as_ptr()).pri = pri };
        state.ready.insert_by_prio(tcb);
    } else {
        unsafe { (*tcb.as_ptr()).pri = pri };
    }
}

/// Look up a live task by name.
///
/// # Errors
/// [`KernelError::NotFound`] if no live task carries the name.
pub fn find(name: &str) -> KernelResult<TcbPtr> {
    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);
        state
            .pool
            .tasks()
            // SAFETY: pool iteration only yields live TCBs.
            .find(|t| unsafe { t.as_ref() }.name == name)
            .ok_or(KernelError::NotFound)
    })
}

/// Log a line for every live task.
pub fn print_all() {
    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);
        for tcb in state.pool.tasks() {
            // SAFETY: pool iteration only yields live TCBs.
            let t = unsafe { tcb.as_ref() };
            crate::info!(
                "{} pri={}/{} {} slice={}",
                t.name,
                t.pri,
                t.base_pri,
                t.status.as_str(),
                t.slice
            );
        }
        crate::info!("free pages: {}", state.pool.free_count());
    });
}

/// Landing point for a task entry function that returns.
///
/// The initial frame's LR points here, so falling off the end of a task
/// terminates it.
#[no_mangle]
pub(crate) extern "C" fn task_exit() -> ! {
    if let Some(cur) = kernel::current() {
        terminate(cur);
    }
    loop {
        crate::port::wait_for_interrupt();
    }
}
