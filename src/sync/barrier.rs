//! Reusable barrier
//!
//! The generation counter distinguishes consecutive wait phases, so a
//! barrier can be reused immediately without lost wake-ups: late sleepers
//! from phase N wake on the generation change, not on the count.

use crate::critical::{critical_section, Guarded};
use crate::sync::cond::Condvar;
use crate::sync::mutex::RawMutex;

struct BarrierState {
    count: u32,
    generation: u32,
}

/// Reusable barrier for a fixed number of tasks
pub struct Barrier {
    mtx: RawMutex,
    cv: Condvar,
    total: u32,
    state: Guarded<BarrierState>,
}

impl Barrier {
    /// Create a barrier that releases once `total` tasks have arrived.
    pub const fn new(total: u32) -> Self {
        Barrier {
            mtx: RawMutex::new(),
            cv: Condvar::new(),
            total,
            state: Guarded::new(BarrierState {
                count: 0,
                generation: 0,
            }),
        }
    }

    /// Block until `total` tasks (including the caller) have arrived.
    pub fn wait(&self) {
        self.mtx.lock();

        let arrival = critical_section(|cs| {
            let state = self.state.borrow_mut(cs);
            state.count += 1;
            (state.generation, state.count)
        });
        let (gen, count) = arrival;

        if count == self.total {
            critical_section(|cs| {
                let state = self.state.borrow_mut(cs);
                state.count = 0;
                state.generation = state.generation.wrapping_add(1);
            });
            self.cv.notify_all();
        } else {
            self.cv.wait(&self.mtx, || {
                critical_section(|cs| self.state.borrow_mut(cs).generation) != gen
            });
        }

        self.mtx.unlock();
    }

    /// Completed wait phases since creation
    pub fn generation(&self) -> u32 {
        critical_section(|cs| self.state.borrow_mut(cs).generation)
    }
}
