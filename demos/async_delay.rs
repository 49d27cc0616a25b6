//! Async executor demo - callbacks and coroutine chains
//!
//! Posts a callback, schedules a delayed one, and spawns a coroutine
//! chain that sleeps without owning a task stack. The executor runs as
//! one lowest-priority task.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use defmt::info;
use mos::exec;
use mos::task;
use mos::time;

static CHAIN_RESULT: AtomicU32 = AtomicU32::new(0);

async fn inner() -> u32 {
    exec::delay(10).await;
    7
}

async fn outer() -> u32 {
    1 + inner().await
}

fn app_task(_: *mut ()) {
    exec::post(|| info!("hello from the executor"));

    exec::delay_ms(100, || info!("one hundred milliseconds later"));

    exec::spawn(async {
        let value = outer().await;
        CHAIN_RESULT.store(value, Ordering::Relaxed);
        info!("coroutine chain resolved to {}", value);
    });

    loop {
        time::delay(500);
        info!(
            "chain={} live frames={}",
            CHAIN_RESULT.load(Ordering::Relaxed),
            exec::frames_in_use()
        );
    }
}

#[entry]
fn main() -> ! {
    info!("Async executor demo");

    mos::os_init();
    task::create(app_task, core::ptr::null_mut(), 16, "app").unwrap();

    mos::os_start();
}
