//! Priority inversion demo - mutex priority inheritance
//!
//! Three tasks: High(10), Med(40), Low(80). Low grabs the mutex and
//! burns cycles; when High contends, Low is boosted to priority 10 so
//! Med cannot starve it. On release High runs at once and Low returns
//! to priority 80.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use defmt::info;
use mos::sync::Mutex;
use mos::task;
use mos::time;

static SHARED: Mutex<u32> = Mutex::new(0);
static HIGH_RUNS: AtomicU32 = AtomicU32::new(0);

fn high_task(_: *mut ()) {
    time::delay(50);
    loop {
        let n = HIGH_RUNS.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut shared = SHARED.lock();
            *shared += 1;
            info!("[HIGH] acquired #{} (shared={})", n, *shared);
        }
        time::delay(100);
    }
}

fn med_task(_: *mut ()) {
    loop {
        for _ in 0..50_000 {
            cortex_m::asm::nop();
        }
        time::delay(10);
    }
}

fn low_task(_: *mut ()) {
    loop {
        {
            let mut shared = SHARED.lock();
            *shared += 1;
            info!("[LOW] holding (shared={})", *shared);
            for _ in 0..100_000 {
                cortex_m::asm::nop();
            }
        }
        time::delay(200);
    }
}

#[entry]
fn main() -> ! {
    info!("Priority inversion demo: H(10) M(40) L(80)");

    mos::os_init();

    task::create(low_task, core::ptr::null_mut(), 80, "low").unwrap();
    task::create(med_task, core::ptr::null_mut(), 40, "med").unwrap();
    task::create(high_task, core::ptr::null_mut(), 10, "high").unwrap();

    mos::os_start();
}
