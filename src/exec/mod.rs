//! Cooperative asynchronous executor
//!
//! A single kernel task at the lowest priority drains a double-buffered
//! ready queue of lambdas and a min-heap of timed sleepers. Posting is
//! O(1) and safe from any context; lambdas posted while a drain is in
//! progress land in the other buffer and run on the next poll.

pub mod coro;
pub mod lambda;
pub mod pool;

pub use coro::{callback, delay, spawn, CallbackAwaiter, Resumer};
pub use lambda::Lambda;
pub use pool::frames_in_use;

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::binary_heap::{BinaryHeap, Min};
use heapless::Deque;

use crate::config::{CFG_ASYNC_QUEUE_CAP, CFG_ASYNC_SLEEPER_CAP, CFG_PRI_MIN};
use crate::core::kernel::KERNEL;
use crate::critical::{critical_section, Guarded};
use crate::kassert;
use crate::task;
use crate::time;
use crate::types::{tick_reached, Tick};

/// A deferred callable keyed by its absolute wake-up tick.
///
/// Ordering uses the wrapping signed difference of ticks, so a bounded
/// wrap-around of the tick counter sorts correctly.
struct Sleeper {
    wake_at: Tick,
    callback: Lambda,
}

impl PartialEq for Sleeper {
    fn eq(&self, other: &Self) -> bool {
        self.wake_at == other.wake_at
    }
}

impl Eq for Sleeper {}

impl PartialOrd for Sleeper {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sleeper {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.wake_at.wrapping_sub(other.wake_at) as i32).cmp(&0)
    }
}

/// The executor state: two ready buffers and the sleeper heap.
pub struct Executor {
    bufs: [Deque<Lambda, CFG_ASYNC_QUEUE_CAP>; 2],
    /// Buffer currently accepting posts
    live: usize,
    sleepers: BinaryHeap<Sleeper, Min, CFG_ASYNC_SLEEPER_CAP>,
}

impl Executor {
    pub const fn new() -> Self {
        Executor {
            bufs: [Deque::new(), Deque::new()],
            live: 0,
            sleepers: BinaryHeap::new(),
        }
    }

    fn post(&mut self, f: Lambda) {
        let ok = self.bufs[self.live].push_back(f).is_ok();
        kassert!(ok, "executor ready queue full");
    }

    fn add_sleeper(&mut self, wake_at: Tick, callback: Lambda) {
        let ok = self.sleepers.push(Sleeper { wake_at, callback }).is_ok();
        kassert!(ok, "executor sleeper heap full");
    }

    /// Move every due sleeper into the write buffer.
    fn clean_sleepers(&mut self, now: Tick) {
        while let Some(top) = self.sleepers.peek() {
            if !tick_reached(now, top.wake_at) {
                break;
            }
            if let Some(sleeper) = self.sleepers.pop() {
                self.post(sleeper.callback);
            }
        }
    }

    /// Collect due sleepers, then swap the buffers. Returns the index of
    /// the buffer to drain; new posts go to the other one.
    fn flip(&mut self, now: Tick) -> usize {
        self.clean_sleepers(now);
        let read = self.live;
        self.live ^= 1;
        read
    }

    fn take(&mut self, read: usize) -> Option<Lambda> {
        self.bufs[read].pop_front()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll an executor cell once: flip under the guard, then invoke the
/// drained lambdas one at a time with interrupts enabled. Each lambda is
/// moved out of the buffer before it runs, so re-entrant posts are fine.
pub(crate) fn poll_cell(cell: &Guarded<Executor>, now: Tick) -> usize {
    let read = critical_section(|cs| cell.borrow_mut(cs).flip(now));
    let mut ran = 0;
    while let Some(mut f) = critical_section(|cs| cell.borrow_mut(cs).take(read)) {
        f.invoke();
        ran += 1;
    }
    ran
}

static EXECUTOR: Guarded<Executor> = Guarded::new(Executor::new());
static EXEC_TASK_SPAWNED: AtomicBool = AtomicBool::new(false);

fn exec_task(_: *mut ()) {
    loop {
        if poll() == 0 {
            task::yield_now();
        }
    }
}

/// Create the executor task on first touch once the kernel runs.
fn ensure_task() {
    if KERNEL.is_running() && !EXEC_TASK_SPAWNED.swap(true, Ordering::AcqRel) {
        task::create(exec_task, core::ptr::null_mut(), CFG_PRI_MIN, "mos/exec")
            .expect("executor task creation failed");
    }
}

/// Post a fire-and-forget callback to the executor.
pub fn post<F>(f: F)
where
    F: FnOnce() + Clone + 'static,
{
    post_lambda(Lambda::new(f));
}

pub(crate) fn post_lambda(f: Lambda) {
    ensure_task();
    critical_section(|cs| EXECUTOR.borrow_mut(cs).post(f));
}

/// Run a callback after (at least) `ms` milliseconds.
pub fn delay_ms<F>(ms: u32, f: F)
where
    F: FnOnce() + Clone + 'static,
{
    sleep_after(time::ms_to_ticks(ms), Lambda::new(f));
}

pub(crate) fn sleep_after(ticks: Tick, f: Lambda) {
    ensure_task();
    let wake_at = time::now().wrapping_add(ticks);
    critical_section(|cs| EXECUTOR.borrow_mut(cs).add_sleeper(wake_at, f));
}

/// Poll the global executor once, returning how many lambdas ran.
pub fn poll() -> usize {
    poll_cell(&EXECUTOR, time::now())
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::boxed::Box;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::vec::Vec;

    use super::*;

    fn leak_cell() -> &'static Guarded<Executor> {
        Box::leak(Box::new(Guarded::new(Executor::new())))
    }

    #[test]
    fn posts_run_in_fifo_order() {
        static ORDER: std::sync::Mutex<Vec<u32>> = std::sync::Mutex::new(Vec::new());
        ORDER.lock().unwrap().clear();

        let cell = leak_cell();
        critical_section(|cs| {
            for i in 0..4u32 {
                cell.borrow_mut(cs).post(Lambda::new(move || {
                    ORDER.lock().unwrap().push(i);
                }));
            }
        });

        assert_eq!(poll_cell(cell, 0), 4);
        assert_eq!(*ORDER.lock().unwrap(), [0, 1, 2, 3]);
    }

    #[test]
    fn post_during_drain_runs_next_poll() {
        static HITS: AtomicU32 = AtomicU32::new(0);
        HITS.store(0, Ordering::Relaxed);

        let cell = leak_cell();
        critical_section(|cs| {
            cell.borrow_mut(cs).post(Lambda::new(move || {
                HITS.fetch_add(1, Ordering::Relaxed);
                // Re-entrant post lands in the flipped write buffer.
                critical_section(|cs| {
                    cell.borrow_mut(cs).post(Lambda::new(|| {
                        HITS.fetch_add(10, Ordering::Relaxed);
                    }));
                });
            }));
        });

        assert_eq!(poll_cell(cell, 0), 1);
        assert_eq!(HITS.load(Ordering::Relaxed), 1);
        assert_eq!(poll_cell(cell, 0), 1);
        assert_eq!(HITS.load(Ordering::Relaxed), 11);
    }

    #[test]
    fn sleepers_fire_at_their_tick() {
        static FIRED: AtomicU32 = AtomicU32::new(0);
        FIRED.store(0, Ordering::Relaxed);

        let cell = leak_cell();
        critical_section(|cs| {
            cell.borrow_mut(cs).add_sleeper(
                100,
                Lambda::new(|| {
                    FIRED.store(1, Ordering::Relaxed);
                }),
            );
        });

        assert_eq!(poll_cell(cell, 99), 0);
        assert_eq!(FIRED.load(Ordering::Relaxed), 0);
        assert_eq!(poll_cell(cell, 100), 1);
        assert_eq!(FIRED.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sleeper_heap_orders_by_earliest_wake() {
        static ORDER: std::sync::Mutex<Vec<u32>> = std::sync::Mutex::new(Vec::new());
        ORDER.lock().unwrap().clear();

        let cell = leak_cell();
        critical_section(|cs| {
            let ex = cell.borrow_mut(cs);
            for wake in [30u32, 10, 20] {
                ex.add_sleeper(
                    wake,
                    Lambda::new(move || {
                        ORDER.lock().unwrap().push(wake);
                    }),
                );
            }
        });

        assert_eq!(poll_cell(cell, 50), 3);
        assert_eq!(*ORDER.lock().unwrap(), [10, 20, 30]);
    }

    #[test]
    fn sleeper_survives_tick_wraparound() {
        static FIRED: AtomicU32 = AtomicU32::new(0);
        FIRED.store(0, Ordering::Relaxed);

        let cell = leak_cell();
        // Inserted at tick 0xFFFFFFFE with a 4 tick delay: wakes at 2.
        let wake_at = 0xFFFF_FFFEu32.wrapping_add(4);
        critical_section(|cs| {
            cell.borrow_mut(cs).add_sleeper(
                wake_at,
                Lambda::new(|| {
                    FIRED.store(1, Ordering::Relaxed);
                }),
            );
        });

        assert_eq!(poll_cell(cell, 0xFFFF_FFFF), 0);
        assert_eq!(poll_cell(cell, 2), 1);
        assert_eq!(FIRED.load(Ordering::Relaxed), 1);
    }
}
