//! Stackless coroutine machinery
//!
//! Coroutines are native Rust futures. `spawn` moves a future into a
//! block from the frame pool and drives it through the executor: a
//! per-frame waker posts a poll lambda whenever the coroutine is woken,
//! and the frame is released once the future completes. Chaining (one
//! `async fn` awaiting another) is handled by the language itself.

use core::future::Future;
use core::marker::PhantomPinned;
use core::pin::Pin;
use core::ptr::NonNull;
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use crate::config::CFG_ASYNC_FRAME_SIZE;
use crate::critical::critical_section;
use crate::exec::{lambda::Lambda, pool};
use crate::types::Tick;

#[derive(Clone, Copy, PartialEq, Eq)]
enum CoroState {
    /// Parked, waiting for a wake
    Waiting,
    /// A poll lambda sits in the executor queue
    Queued,
    /// Currently being polled
    Running,
    /// Woken while running; re-queue after the poll returns
    Notified,
    /// Completed; the frame is (being) released
    Done,
}

/// Header at the base of every coroutine frame; the future lives behind
/// it at its natural alignment.
#[repr(C)]
struct FrameHeader {
    poll: unsafe fn(*mut FrameHeader),
    state: CoroState,
}

const fn frame_offset(align: usize) -> usize {
    let header = core::mem::size_of::<FrameHeader>();
    (header + align - 1) / align * align
}

unsafe fn future_ptr<F>(header: *mut FrameHeader) -> *mut F {
    // SAFETY: the frame was laid out by `spawn` with the future at this
    // offset.
    unsafe { header.cast::<u8>().add(frame_offset(core::mem::align_of::<F>())).cast::<F>() }
}

static CORO_VTABLE: RawWakerVTable = RawWakerVTable::new(
    |p| RawWaker::new(p, &CORO_VTABLE),
    |p| wake_frame(p as *mut FrameHeader),
    |p| wake_frame(p as *mut FrameHeader),
    |_| (),
);

/// Request a poll of the coroutine in `header`.
///
/// Wakes directed at a completed frame are ignored; a stale waker whose
/// frame has been reused merely causes a spurious poll, which futures
/// must tolerate.
fn wake_frame(header: *mut FrameHeader) {
    critical_section(|_| {
        // SAFETY: under the guard; the header stays valid until Done.
        unsafe {
            match (*header).state {
                CoroState::Waiting => {
                    (*header).state = CoroState::Queued;
                    super::post_lambda(Lambda::new(move || poll_frame(header)));
                }
                CoroState::Running => (*header).state = CoroState::Notified,
                _ => {}
            }
        }
    });
}

fn poll_frame(header: *mut FrameHeader) {
    let run = critical_section(|_| {
        // SAFETY: under the guard.
        unsafe {
            if (*header).state == CoroState::Done {
                false
            } else {
                (*header).state = CoroState::Running;
                true
            }
        }
    });
    if run {
        // SAFETY: the poll function was installed for this frame's
        // future type by `spawn`.
        unsafe { ((*header).poll)(header) };
    }
}

unsafe fn poll_raw<F: Future<Output = ()>>(header: *mut FrameHeader) {
    // SAFETY: the future lives in the frame and never moves; the waker
    // data is the frame address.
    let result = unsafe {
        let fut = Pin::new_unchecked(&mut *future_ptr::<F>(header));
        let waker = Waker::from_raw(RawWaker::new(header.cast(), &CORO_VTABLE));
        let mut cx = Context::from_waker(&waker);
        fut.poll(&mut cx)
    };

    match result {
        Poll::Ready(()) => {
            // SAFETY: completion ends the future's lifetime; the frame
            // goes back to the pool afterwards.
            unsafe { core::ptr::drop_in_place(future_ptr::<F>(header)) };
            critical_section(|_| {
                // SAFETY: under the guard.
                unsafe { (*header).state = CoroState::Done };
            });
            // SAFETY: the frame address came from the pool.
            pool::release_frame(unsafe { NonNull::new_unchecked(header.cast()) });
        }
        Poll::Pending => {
            critical_section(|_| {
                // SAFETY: under the guard.
                unsafe {
                    if (*header).state == CoroState::Notified {
                        (*header).state = CoroState::Queued;
                        super::post_lambda(Lambda::new(move || poll_frame(header)));
                    } else {
                        (*header).state = CoroState::Waiting;
                    }
                }
            });
        }
    }
}

/// Launch a coroutine on the executor, detached.
///
/// The future is moved into a frame-pool block and polled from executor
/// context until completion, after which the block is recycled. The
/// frame layout is checked against the configured block size at compile
/// time.
pub fn spawn<F>(f: F)
where
    F: Future<Output = ()> + 'static,
{
    const {
        assert!(
            frame_offset(core::mem::align_of::<F>()) + core::mem::size_of::<F>()
                <= CFG_ASYNC_FRAME_SIZE,
            "coroutine frame exceeds the configured block size"
        );
        assert!(core::mem::align_of::<F>() <= 8);
    }

    let frame = pool::alloc_frame();
    let header = frame.as_ptr() as *mut FrameHeader;
    // SAFETY: the block is fresh, aligned, and large enough (asserted
    // above).
    unsafe {
        header.write(FrameHeader {
            poll: poll_raw::<F>,
            state: CoroState::Waiting,
        });
        future_ptr::<F>(header).write(f);
    }
    wake_frame(header);
}

/// Resume handle handed to a [`callback`] adapter's function.
///
/// Calling [`resume`](Resumer::resume) stores the value and wakes the
/// awaiting coroutine.
pub struct Resumer<T> {
    slot: *mut Option<T>,
    waker: Waker,
}

impl<T> Resumer<T> {
    /// Deliver the awaited value and resume the coroutine.
    pub fn resume(self, value: T) {
        let Resumer { slot, waker } = self;
        critical_section(|_| {
            // SAFETY: the slot lives in the awaiter inside a pinned
            // coroutine frame, which stays allocated while the await is
            // outstanding.
            unsafe { *slot = Some(value) };
        });
        waker.wake();
    }
}

impl<T> Clone for Resumer<T> {
    fn clone(&self) -> Self {
        Resumer {
            slot: self.slot,
            waker: self.waker.clone(),
        }
    }
}

// SAFETY: delivery is serialized by the interrupt guard.
unsafe impl<T: Send> Send for Resumer<T> {}

/// Adapter that turns a callback-style API into an awaitable.
///
/// On first poll the user function runs with a [`Resumer`]; the await
/// completes once the resumer is called.
pub struct CallbackAwaiter<T, F> {
    callback: Option<F>,
    value: Option<T>,
    _pin: PhantomPinned,
}

/// Wrap a callback-taking function into an awaitable.
pub fn callback<T, F>(f: F) -> CallbackAwaiter<T, F>
where
    F: FnOnce(Resumer<T>),
{
    CallbackAwaiter {
        callback: Some(f),
        value: None,
        _pin: PhantomPinned,
    }
}

impl<T, F> Future for CallbackAwaiter<T, F>
where
    F: FnOnce(Resumer<T>),
{
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        // SAFETY: fields are only taken in place, never moved out of the
        // pinned allocation.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(value) = critical_section(|_| this.value.take()) {
            return Poll::Ready(value);
        }

        if let Some(cb) = this.callback.take() {
            let resumer = Resumer {
                slot: &mut this.value as *mut Option<T>,
                waker: cx.waker().clone(),
            };
            cb(resumer);
            // The callback may have resumed synchronously.
            if let Some(value) = critical_section(|_| this.value.take()) {
                return Poll::Ready(value);
            }
        }

        Poll::Pending
    }
}

/// Suspend the calling coroutine for `ticks` system ticks.
pub fn delay(ticks: Tick) -> impl Future<Output = ()> {
    callback(move |resumer: Resumer<()>| {
        super::sleep_after(ticks, Lambda::new(move || resumer.resume(())));
    })
}
