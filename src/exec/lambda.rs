//! Fixed-size type-erased callables
//!
//! A `Lambda` is a value-type callable suitable for storage in
//! fixed-capacity containers: a pointer-aligned inline buffer plus a
//! static vtable of invoke/clone/drop. Construction proves at compile
//! time that the captured state fits. A lambda is invoked at most once;
//! moves are plain bit-copies (Rust never drops a moved-from value).

use core::mem::MaybeUninit;

use crate::config::CFG_ASYNC_LAMBDA_SIZE;

/// Alignment of the inline buffer; captures may not require more.
pub const LAMBDA_ALIGN: usize = 8;

#[repr(C, align(8))]
struct Buf([MaybeUninit<u8>; CFG_ASYNC_LAMBDA_SIZE]);

struct LambdaVt {
    invoke: unsafe fn(*mut u8),
    clone: unsafe fn(*const u8, *mut u8),
    drop: unsafe fn(*mut u8),
}

unsafe fn invoke_raw<F: FnOnce()>(p: *mut u8) {
    // SAFETY: `p` holds a valid `F`; reading it out transfers ownership,
    // so the captures are consumed (and dropped) by the call.
    let f = unsafe { p.cast::<F>().read() };
    f();
}

unsafe fn clone_raw<F: Clone>(src: *const u8, dst: *mut u8) {
    // SAFETY: `src` holds a valid `F`, `dst` is writable buffer space.
    unsafe { dst.cast::<F>().write((*src.cast::<F>()).clone()) }
}

unsafe fn drop_raw<F>(p: *mut u8) {
    // SAFETY: `p` holds a valid, not-yet-invoked `F`.
    unsafe { core::ptr::drop_in_place(p.cast::<F>()) }
}

struct Vt<F>(core::marker::PhantomData<F>);

impl<F: FnOnce() + Clone> Vt<F> {
    const VT: LambdaVt = LambdaVt {
        invoke: invoke_raw::<F>,
        clone: clone_raw::<F>,
        drop: drop_raw::<F>,
    };
}

/// Fixed-size type-erased callable
pub struct Lambda {
    buf: Buf,
    vt: Option<&'static LambdaVt>,
}

// SAFETY: lambdas cross contexts only through the executor's queues,
// which are serialized by the interrupt guard.
unsafe impl Send for Lambda {}
unsafe impl Sync for Lambda {}

impl Lambda {
    /// Wrap a callable. The capture must fit the configured inline size.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Clone + 'static,
    {
        const {
            assert!(
                core::mem::size_of::<F>() <= CFG_ASYNC_LAMBDA_SIZE,
                "lambda capture exceeds the configured size"
            );
            assert!(core::mem::align_of::<F>() <= LAMBDA_ALIGN);
        }

        let mut lambda = Lambda {
            buf: Buf([MaybeUninit::uninit(); CFG_ASYNC_LAMBDA_SIZE]),
            vt: Some(&Vt::<F>::VT),
        };
        // SAFETY: size and alignment were just asserted.
        unsafe { lambda.buf.0.as_mut_ptr().cast::<F>().write(f) };
        lambda
    }

    /// Call the wrapped function, consuming the capture. A second call
    /// is a no-op.
    pub fn invoke(&mut self) {
        if let Some(vt) = self.vt.take() {
            // SAFETY: the vtable was built for the buffer's contents,
            // and taking it guarantees single invocation.
            unsafe { (vt.invoke)(self.buf.0.as_mut_ptr().cast()) };
        }
    }

    /// Whether the lambda still holds an uninvoked callable
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.vt.is_some()
    }
}

impl Clone for Lambda {
    fn clone(&self) -> Self {
        let mut dup = Lambda {
            buf: Buf([MaybeUninit::uninit(); CFG_ASYNC_LAMBDA_SIZE]),
            vt: self.vt,
        };
        if let Some(vt) = self.vt {
            // SAFETY: both buffers are sized for the same capture type.
            unsafe {
                (vt.clone)(self.buf.0.as_ptr().cast(), dup.buf.0.as_mut_ptr().cast());
            }
        }
        dup
    }
}

impl Drop for Lambda {
    fn drop(&mut self) {
        if let Some(vt) = self.vt.take() {
            // SAFETY: an armed lambda still owns its capture.
            unsafe { (vt.drop)(self.buf.0.as_mut_ptr().cast()) };
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn invoked_exactly_once() {
        static HITS: AtomicU32 = AtomicU32::new(0);
        let mut f = Lambda::new(|| {
            HITS.fetch_add(1, Ordering::Relaxed);
        });
        assert!(f.is_armed());
        f.invoke();
        f.invoke();
        assert_eq!(HITS.load(Ordering::Relaxed), 1);
        assert!(!f.is_armed());
    }

    #[test]
    fn clone_is_independent() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let mut a = Lambda::new(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        let mut b = a.clone();
        a.invoke();
        b.invoke();
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn dropping_unarmed_capture_releases_it() {
        let payload = Arc::new(());
        let p = payload.clone();
        let f = Lambda::new(move || {
            let _ = &p;
        });
        assert_eq!(Arc::strong_count(&payload), 2);
        drop(f);
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn invoking_consumes_the_capture() {
        let payload = Arc::new(());
        let p = payload.clone();
        let mut f = Lambda::new(move || {
            let _ = &p;
        });
        f.invoke();
        assert_eq!(Arc::strong_count(&payload), 1);
        drop(f);
        assert_eq!(Arc::strong_count(&payload), 1);
    }
}
