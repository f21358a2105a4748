//! # Periodic ticker
//!
//! An interval timer fanning out two callables every 200 ms, stopped
//! after one second.
//!
//! Run with: `cargo run --example interval`

use std::time::Duration;

use workq::{IntervalTimer, WorkQueue};

fn main() {
    let queue = WorkQueue::new();
    queue.start(1);

    let timer = IntervalTimer::new(&queue, 0);
    timer
        .with_interval(Duration::from_millis(200))
        .push(|| println!("tick"))
        .push(|| println!("tock"));
    timer.start(Duration::ZERO);

    std::thread::sleep(Duration::from_secs(1));
    timer.stop();
    queue.stop();
    println!("stopped");
}
