//! Synchronization primitives layered on task block/resume

pub mod barrier;
pub mod cond;
pub mod lock;
pub mod mutex;
pub mod sem;

pub use barrier::Barrier;
pub use cond::Condvar;
pub use lock::Lock;
pub use mutex::{Mutex, MutexGuard, RawMutex};
pub use sem::Semaphore;
