//! Round-robin demo - three equal-priority counters
//!
//! Three tasks at priority 32 increment their own counters, yielding
//! every 10 increments. Watch the counters stay within a hair of each
//! other as the slice rotation shares the band.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use defmt::info;
use mos::task;
use mos::time;

static COUNTERS: [AtomicU32; 3] = [
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
];

fn counter_task(arg: *mut ()) {
    let idx = arg as usize;
    loop {
        let n = COUNTERS[idx].fetch_add(1, Ordering::Relaxed) + 1;
        if n % 10 == 0 {
            task::yield_now();
        }
    }
}

fn report_task(_: *mut ()) {
    loop {
        time::delay(300);
        let counts = [
            COUNTERS[0].load(Ordering::Relaxed),
            COUNTERS[1].load(Ordering::Relaxed),
            COUNTERS[2].load(Ordering::Relaxed),
        ];
        info!("counters: {} {} {}", counts[0], counts[1], counts[2]);
    }
}

#[entry]
fn main() -> ! {
    info!("Round-robin demo: three tasks at priority 32");

    mos::os_init();

    task::create(counter_task, 0 as *mut (), 32, "cnt0").unwrap();
    task::create(counter_task, 1 as *mut (), 32, "cnt1").unwrap();
    task::create(counter_task, 2 as *mut (), 32, "cnt2").unwrap();
    task::create(report_task, core::ptr::null_mut(), 8, "report").unwrap();

    mos::os_start();
}
