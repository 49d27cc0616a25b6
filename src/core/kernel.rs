//! Global kernel state and initialization
//!
//! The current-task pointer, the three global lists and the page pool are
//! shared across interrupt and task context. They are kept in a single
//! aggregate protected uniformly by the interrupt guard, plus a small set
//! of atomic flags.

use core::ptr::NonNull;

use crate::config::{CFG_PRI_MIN, CFG_SYSCLK_HZ, CFG_SYSTICK_HZ};
use crate::core::list::TcbList;
use crate::core::page::PagePool;
use crate::critical::{critical_section, Guarded};
use crate::kassert;
use crate::task::{Tcb, TcbPtr};
use crate::types::Tick;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Atomic kernel flags
pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
    tick_counter: AtomicU32,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tick_counter: AtomicU32::new(0),
        }
    }

    /// Check if the scheduler has been started
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if the kernel has been initialized
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Current tick count
    #[inline(always)]
    pub fn tick_get(&self) -> Tick {
        self.tick_counter.load(Ordering::Relaxed)
    }

    /// Increment and return the tick count
    #[inline(always)]
    pub(crate) fn tick_increment(&self) -> Tick {
        self.tick_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    #[inline(always)]
    pub(crate) fn set_initialized(&self, val: bool) {
        self.initialized.store(val, Ordering::SeqCst);
    }

    #[inline(always)]
    pub(crate) fn set_running(&self, val: bool) {
        self.running.store(val, Ordering::SeqCst);
    }
}

/// Global kernel flags instance
pub static KERNEL: KernelFlags = KernelFlags::new();

/// The list/pool aggregate shared by tasks and interrupt handlers.
pub(crate) struct KernelState {
    /// Tasks that can run, ordered by current priority, FIFO on ties.
    /// The running task stays at its position in this list.
    pub(crate) ready: TcbList,
    /// Tasks parked by `task::block`
    pub(crate) blocked: TcbList,
    /// Tasks waiting for a tick, ordered by wake-up tick
    pub(crate) sleeping: TcbList,
    /// Stack page pool
    pub(crate) pool: PagePool,
    /// Number of live (non-terminated) tasks
    pub(crate) task_count: usize,
}

impl KernelState {
    pub(crate) const fn new() -> Self {
        Self {
            ready: TcbList::new(),
            blocked: TcbList::new(),
            sleeping: TcbList::new(),
            pool: PagePool::new(),
            task_count: 0,
        }
    }

    pub(crate) fn init(&mut self) {
        self.ready.init();
        self.blocked.init();
        self.sleeping.init();
        self.task_count = 0;
    }
}

/// Global kernel state instance
pub(crate) static KERNEL_STATE: Guarded<KernelState> = Guarded::new(KernelState::new());

/// Currently running task. The context-switch assembly reads and the
/// scheduler decision writes this symbol, so it must stay a plain
/// pointer with external linkage.
#[no_mangle]
pub static mut CUR_TCB: *mut Tcb = core::ptr::null_mut();

/// Current task handle
#[inline]
pub fn current() -> Option<TcbPtr> {
    // SAFETY: plain pointer read; the value is only written inside
    // interrupt-disabled sections or the switch interrupt itself.
    NonNull::new(unsafe { CUR_TCB })
}

/// Install the current task pointer
#[inline]
pub(crate) unsafe fn set_current(tcb: Option<TcbPtr>) {
    unsafe {
        CUR_TCB = tcb.map_or(core::ptr::null_mut(), NonNull::as_ptr);
    }
}

/// Current tick count
#[inline]
pub fn tick_get() -> Tick {
    KERNEL.tick_get()
}

/// Idle task: halt until the next interrupt.
fn idle_task(_: *mut ()) {
    loop {
        crate::port::wait_for_interrupt();
    }
}

/// Initialize the kernel
///
/// Resets the global lists and flags and creates the idle task. Must be
/// called before any task is created and before [`os_start`].
pub fn os_init() {
    kassert!(!KERNEL.is_running(), "init while running");

    critical_section(|cs| {
        KERNEL_STATE.borrow_mut(cs).init();
        // SAFETY: scheduler not running, interrupts disabled.
        unsafe { set_current(None) };
    });

    KERNEL.set_initialized(true);

    crate::task::create(idle_task, core::ptr::null_mut(), CFG_PRI_MIN, "idle")
        .expect("idle task creation failed");
}

/// Start multitasking. Never returns.
///
/// Picks the highest-priority ready task, starts the tick source and
/// jumps into the first task through the supervisor-call entry.
pub fn os_start() -> ! {
    kassert!(KERNEL.is_initialized(), "start before init");
    kassert!(!KERNEL.is_running(), "start while running");

    critical_section(|cs| {
        let state = KERNEL_STATE.borrow_mut(cs);
        let first = state.ready.head().expect("no task to start");
        // SAFETY: exclusive access under the guard.
        unsafe {
            (*first.as_ptr()).status = crate::types::TaskState::Running;
            set_current(Some(first));
        }
        KERNEL.set_running(true);
    });

    crate::port::systick_init(CFG_SYSCLK_HZ / CFG_SYSTICK_HZ);

    // SAFETY: kernel state is consistent and CUR_TCB points at a task
    // with a valid initial frame.
    unsafe { crate::port::start_first_task() }
}
