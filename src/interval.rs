//! # Interval timer: periodic fan-out of callables at a fixed cadence.
//!
//! An [`IntervalTimer`] invokes all of its callables once per tick, in
//! insertion order, synchronously inside one dispatch. Each tick
//! re-schedules the next one a full period after its own dispatch, so the
//! cadence is drift-free relative to dispatch time (not to a wall-clock
//! calendar).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::event::Priority;
use crate::node::{Status, StepResult};
use crate::queue::WorkQueue;
use crate::sequence::Coroutine;

type TickFns = Arc<Mutex<Vec<Box<dyn FnMut() + Send>>>>;

/// # Periodic driver over a list of callables.
///
/// Built as a two-step sequence: the first step fires once after the
/// start delay, the second re-enqueues itself every period.
pub struct IntervalTimer {
    node: Arc<Coroutine>,
    funcs: TickFns,
    period: Mutex<Duration>,
    armed: AtomicBool,
}

impl IntervalTimer {
    /// Creates an interval timer bound to `queue` with a tick priority.
    pub fn new(queue: &Arc<WorkQueue>, priority: Priority) -> Self {
        Self {
            node: Coroutine::new(queue, priority),
            funcs: Arc::new(Mutex::new(Vec::new())),
            period: Mutex::new(Duration::ZERO),
            armed: AtomicBool::new(false),
        }
    }

    /// Sets the tick period. Must be called before [`start`](IntervalTimer::start).
    pub fn with_interval(&self, period: Duration) -> &Self {
        *self.period.lock() = period;
        self
    }

    /// Appends a callable run on every tick, after those already pushed.
    pub fn push(&self, func: impl FnMut() + Send + 'static) -> &Self {
        self.funcs.lock().push(Box::new(func));
        self
    }

    /// Starts ticking: the first tick fires `initial_delay` from now,
    /// each subsequent tick one period after the previous dispatch.
    pub fn start(&self, initial_delay: Duration) {
        if !self.armed.swap(true, Ordering::AcqRel) {
            let period = *self.period.lock();
            let funcs = self.funcs.clone();
            self.node.push_after(initial_delay, move || {
                tick(&funcs);
                StepResult::Next
            });
            let funcs = self.funcs.clone();
            self.node.push_after(period, move || {
                tick(&funcs);
                StepResult::Retry
            });
        }
        self.node.start();
    }

    /// Cancels the pending tick and goes idle; a later
    /// [`start`](IntervalTimer::start) begins again with the start delay.
    pub fn stop(&self) {
        self.node.stop();
    }

    /// Holds ticking after the tick in flight, keeping the schedule
    /// position.
    pub fn suspend(&self) {
        self.node.suspend();
    }

    /// Resumes ticking; the next tick fires one period after resumption.
    pub fn resume(&self) {
        self.node.resume();
    }

    /// Current execution state.
    pub fn status(&self) -> Status {
        self.node.status()
    }
}

fn tick(funcs: &TickFns) {
    for func in funcs.lock().iter_mut() {
        func();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn callables_run_in_insertion_order_each_tick() {
        let queue = WorkQueue::new();
        let (tx, rx) = mpsc::channel();

        let timer = IntervalTimer::new(&queue, 0);
        let t1 = tx.clone();
        let t2 = tx;
        timer
            .with_interval(Duration::from_millis(20))
            .push(move || t1.send("one").unwrap())
            .push(move || t2.send("two").unwrap());
        timer.start(Duration::ZERO);

        queue.start(1);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        }
        assert_eq!(seen, vec!["one", "two", "one", "two"]);
        timer.stop();
        queue.stop();
    }

    #[test]
    fn ticks_respect_the_period() {
        let queue = WorkQueue::new();
        let (tx, rx) = mpsc::channel();

        let timer = IntervalTimer::new(&queue, 0);
        timer
            .with_interval(Duration::from_millis(50))
            .push(move || tx.send(Instant::now()).unwrap());

        queue.start(1);
        let begin = Instant::now();
        timer.start(Duration::ZERO);

        let _first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(second.duration_since(begin) >= Duration::from_millis(50));
        timer.stop();
        queue.stop();
    }

    #[test]
    fn stop_halts_ticking() {
        let queue = WorkQueue::new();
        let (tx, rx) = mpsc::channel();

        let timer = IntervalTimer::new(&queue, 0);
        timer
            .with_interval(Duration::from_millis(20))
            .push(move || tx.send(()).unwrap());
        timer.start(Duration::ZERO);

        queue.start(1);
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        timer.stop();
        assert_eq!(timer.status(), Status::Idle);

        // Drain whatever was already in flight, then expect silence.
        std::thread::sleep(Duration::from_millis(60));
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        queue.stop();
    }
}
