//! # Priority ordering under load
//!
//! Queues background and control events before starting a single worker,
//! with the built-in `LogWriter` showing submissions and dispatches.
//!
//! Run with: `cargo run --example priorities --features logging`

use workq::{LogWriter, QueueConfig, WorkQueue};

fn main() {
    let queue = WorkQueue::with_observer(QueueConfig::default(), LogWriter);

    // Everything is queued up front; the worker then drains strictly by
    // priority, FIFO within each level.
    for i in 0..3 {
        queue
            .submit_fn(5, move || println!("background job {i}"))
            .unwrap();
    }
    for i in 0..3 {
        queue
            .submit_fn(0, move || println!("control event {i}"))
            .unwrap();
    }

    queue.start(1);
    std::thread::sleep(std::time::Duration::from_millis(200));
    queue.stop();
}
