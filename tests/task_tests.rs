//! Task lifecycle tests on the host stub port
//!
//! The whole lifecycle is exercised from one test function: the kernel
//! globals are process-wide and the scheduler never actually runs on the
//! host, so the sequence below is the single source of ordering.

use mos::config::{CFG_MAX_TASK_NUM, CFG_PRI_MIN};
use mos::error::KernelError;
use mos::task;
use mos::types::TaskState;

fn noop_task(_: *mut ()) {}

#[test]
fn task_lifecycle() {
    mos::os_init();

    // os_init created the idle task at the lowest priority.
    let idle = task::find("idle").expect("idle task exists");
    assert_eq!(unsafe { idle.as_ref() }.pri, CFG_PRI_MIN);
    assert_eq!(unsafe { idle.as_ref() }.status, TaskState::Ready);

    // A higher-priority task lands ahead of idle in the ready list.
    let worker = task::create(noop_task, core::ptr::null_mut(), 10, "worker")
        .expect("creation succeeds");
    assert_eq!(unsafe { worker.as_ref() }.status, TaskState::Ready);
    assert_eq!(task::find("worker").unwrap(), worker);

    // block then resume leaves the task READY again.
    task::block(worker);
    assert_eq!(unsafe { worker.as_ref() }.status, TaskState::Blocked);
    task::block(worker); // idempotent
    assert_eq!(unsafe { worker.as_ref() }.status, TaskState::Blocked);

    task::resume(worker);
    assert_eq!(unsafe { worker.as_ref() }.status, TaskState::Ready);
    task::resume(worker); // idempotent
    assert_eq!(unsafe { worker.as_ref() }.status, TaskState::Ready);

    // Fill the task table: idle + worker leave room for 14 more.
    let mut extras = Vec::new();
    for i in 0..CFG_MAX_TASK_NUM - 2 {
        let name: &'static str = Box::leak(format!("t{i}").into_boxed_str());
        extras.push(
            task::create(noop_task, core::ptr::null_mut(), 64, name)
                .expect("under the task cap"),
        );
    }

    // The 17th live task is refused and nothing leaks.
    assert_eq!(
        task::create(noop_task, core::ptr::null_mut(), 64, "overflow"),
        Err(KernelError::TooManyTasks)
    );
    assert!(task::find("overflow").is_err());

    // Terminating a task returns its page: an identical create succeeds.
    let victim = extras.pop().unwrap();
    task::terminate(victim);
    assert_eq!(unsafe { victim.as_ref() }.status, TaskState::Terminated);
    task::terminate(victim); // idempotent

    // Blocking or resuming a terminated task is a no-op.
    task::block(victim);
    task::resume(victim);
    assert_eq!(unsafe { victim.as_ref() }.status, TaskState::Terminated);

    // The recycled page backs the next creation; `victim` is dead now.
    let replacement = task::create(noop_task, core::ptr::null_mut(), 64, "replacement")
        .expect("page was recycled");
    assert_eq!(task::find("replacement").unwrap(), replacement);

    // Unknown names report NotFound.
    assert_eq!(task::find("missing"), Err(KernelError::NotFound));

    task::print_all();
}
