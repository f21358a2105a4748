//! # The work queue: prioritized FIFO plus timer set, multi-worker dispatch.
//!
//! A [`WorkQueue`] owns one ready FIFO and one timer set behind a single
//! mutex, with a single condition variable for wait/wake. Producers call
//! [`submit`]/[`submit_after`] from any thread; workers loop in [`run`],
//! either on caller threads or on internal threads spawned by [`start`].
//!
//! A worker iteration:
//! 1. under the lock, migrate expired timer entries into the FIFO;
//! 2. under the lock, pop the highest-priority ready event; if one is
//!    returned, release the lock and invoke it;
//! 3. otherwise wait on the condvar, bounded by the earliest timer
//!    deadline when the timer set is non-empty, unbounded when it is
//!    empty, and start over.
//!
//! Event bodies run without the queue lock held, so bodies on different
//! workers run in parallel and may freely call back into the queue.
//!
//! [`submit`]: WorkQueue::submit
//! [`submit_after`]: WorkQueue::submit_after
//! [`run`]: WorkQueue::run
//! [`start`]: WorkQueue::start

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::event::{Event, EventRef, Priority};
use crate::fifo::PriorityFifo;
use crate::observer::{Notice, NoticeKind, Observer};
use crate::timer::TimerSet;

struct QueueState {
    fifo: PriorityFifo,
    timers: TimerSet,
}

impl QueueState {
    fn drain_expired(&mut self, now: Instant) {
        self.timers.drain_expired(now, &mut self.fifo);
    }
}

/// # Priority-aware work queue with scheduled events.
///
/// # Example
/// ```
/// use std::sync::mpsc;
/// use workq::WorkQueue;
///
/// let queue = WorkQueue::new();
/// let (tx, rx) = mpsc::channel();
///
/// queue.submit_fn(0, move || {
///     tx.send("done").unwrap();
/// }).unwrap();
///
/// queue.start(1);
/// assert_eq!(rx.recv().unwrap(), "done");
/// queue.stop();
/// ```
pub struct WorkQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    quit: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    observer: Option<Arc<dyn Observer>>,
    cfg: QueueConfig,
    this: Weak<WorkQueue>,
}

impl WorkQueue {
    /// Creates a queue with the default [`QueueConfig`].
    pub fn new() -> Arc<Self> {
        Self::with_config(QueueConfig::default())
    }

    /// Creates a queue with the given configuration.
    pub fn with_config(cfg: QueueConfig) -> Arc<Self> {
        Self::build(cfg, None)
    }

    /// Creates a queue that reports lifecycle notices to `observer`.
    ///
    /// The observer runs synchronously on whatever thread triggers the
    /// notice, always outside the queue lock.
    pub fn with_observer(cfg: QueueConfig, observer: impl Observer + 'static) -> Arc<Self> {
        Self::build(cfg, Some(Arc::new(observer)))
    }

    fn build(cfg: QueueConfig, observer: Option<Arc<dyn Observer>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            state: Mutex::new(QueueState {
                fifo: PriorityFifo::new(),
                timers: TimerSet::new(),
            }),
            ready: Condvar::new(),
            quit: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            observer,
            cfg,
            this: this.clone(),
        })
    }

    fn notice(&self, notice: Notice) {
        if let Some(obs) = &self.observer {
            obs.notify(&notice);
        }
    }

    /// Enqueues an event and wakes one waiting worker.
    ///
    /// Returns the same handle for convenience; keep a clone to
    /// [`cancel`](WorkQueue::cancel) later.
    ///
    /// # Errors
    ///
    /// [`QueueError::ShutDown`] after [`quit`](WorkQueue::quit).
    pub fn submit(&self, ev: EventRef) -> Result<EventRef, QueueError> {
        if self.is_shutdown() {
            return Err(QueueError::ShutDown);
        }
        {
            let mut state = self.state.lock();
            state.fifo.push(ev.clone());
        }
        self.ready.notify_one();
        self.notice(Notice::now(NoticeKind::Submitted).with_priority(ev.priority()));
        Ok(ev)
    }

    /// Creates an event from `func` at `priority` and submits it.
    pub fn submit_fn(
        &self,
        priority: Priority,
        func: impl FnMut() + Send + 'static,
    ) -> Result<EventRef, QueueError> {
        self.submit(Event::new(priority, func))
    }

    /// Schedules an event to become ready `delay` from now.
    ///
    /// The event is not dispatched before its deadline; it becomes
    /// eligible at or after it and never preempts a running body.
    ///
    /// # Errors
    ///
    /// [`QueueError::ShutDown`] after [`quit`](WorkQueue::quit).
    pub fn submit_after(&self, delay: Duration, ev: EventRef) -> Result<EventRef, QueueError> {
        if self.is_shutdown() {
            return Err(QueueError::ShutDown);
        }
        let deadline = Instant::now() + delay;
        {
            let mut state = self.state.lock();
            state.timers.schedule(deadline, ev.clone());
        }
        // A waiter holding a later deadline must recompute its bound.
        // Waking one that has nothing to do yet is harmless.
        self.ready.notify_one();
        self.notice(
            Notice::now(NoticeKind::TimerScheduled)
                .with_priority(ev.priority())
                .with_delay(delay),
        );
        Ok(ev)
    }

    /// Creates an event from `func` and schedules it `delay` from now.
    pub fn submit_after_fn(
        &self,
        delay: Duration,
        priority: Priority,
        func: impl FnMut() + Send + 'static,
    ) -> Result<EventRef, QueueError> {
        self.submit_after(delay, Event::new(priority, func))
    }

    /// Best-effort removal of a pending event, by handle identity.
    ///
    /// Looks in the timer set first, then in the ready FIFO. Returns
    /// whether a removal occurred; an event already popped by a worker
    /// runs to completion and `cancel` reports false. Safe to call twice.
    pub fn cancel(&self, ev: &EventRef) -> bool {
        let found = {
            let mut state = self.state.lock();
            state.timers.erase(ev) || state.fifo.erase(ev)
        };
        self.notice(Notice::now(NoticeKind::Canceled).with_found(found));
        found
    }

    /// Runs the worker loop on the calling thread until [`quit`].
    ///
    /// Any number of threads may run the loop concurrently. A panicking
    /// event body propagates and terminates the worker running it; other
    /// workers are unaffected. Dispatching an event with no bound
    /// callable is a fatal programmer error and also panics the worker.
    ///
    /// [`quit`]: WorkQueue::quit
    pub fn run(&self) {
        loop {
            let ev = {
                let mut state = self.state.lock();
                // Re-check under the lock: quit() may have fired between
                // iterations and its notification must not be lost.
                if self.quit.load(Ordering::Acquire) {
                    return;
                }
                state.drain_expired(Instant::now());
                match state.fifo.pop() {
                    Some(ev) => Some(ev),
                    None => {
                        match state.timers.earliest() {
                            Some(deadline) => {
                                self.ready.wait_until(&mut state, deadline);
                            }
                            None => self.ready.wait(&mut state),
                        }
                        None
                    }
                }
            };
            if let Some(ev) = ev {
                self.notice(Notice::now(NoticeKind::Dispatched).with_priority(ev.priority()));
                if let Err(e) = ev.invoke() {
                    panic!("dispatch failed: {e}");
                }
            }
        }
    }

    /// Spawns `n` internal worker threads, each running [`run`](WorkQueue::run).
    ///
    /// `n == 0` falls back to [`QueueConfig::workers`], which at 0 means
    /// one worker per CPU core. Threads are named `{thread_name}-{index}`.
    pub fn start(&self, n: usize) {
        let count = match n {
            0 => match self.cfg.workers {
                0 => num_cpus::get(),
                configured => configured,
            },
            requested => requested,
        };

        let mut workers = self.workers.lock();
        let base = workers.len();
        for i in 0..count {
            // The queue only exists behind an Arc (see the constructors),
            // so the self handle is always live here.
            let Some(queue) = self.this.upgrade() else {
                return;
            };
            let index = base + i;
            let handle = thread::Builder::new()
                .name(format!("{}-{}", self.cfg.thread_name, index))
                .spawn(move || {
                    queue.notice(Notice::now(NoticeKind::WorkerStarted).with_worker(index));
                    queue.run();
                    queue.notice(Notice::now(NoticeKind::WorkerExited).with_worker(index));
                })
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }
    }

    /// Requests shutdown: sets the quit flag and wakes every worker.
    ///
    /// Pending work is not drained; a worker that wakes with the flag set
    /// returns immediately even if events remain queued. Shutdown is
    /// sticky: the queue cannot be restarted afterwards.
    pub fn quit(&self) {
        self.quit.store(true, Ordering::Release);
        self.ready.notify_all();
        self.notice(Notice::now(NoticeKind::ShutdownRequested));
    }

    /// Joins all internal worker threads spawned by [`start`](WorkQueue::start).
    ///
    /// A worker that died from a panicking event body is treated as
    /// exited.
    pub fn wait(&self) {
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// [`quit`](WorkQueue::quit) followed by [`wait`](WorkQueue::wait).
    pub fn stop(&self) {
        self.quit();
        self.wait();
    }

    /// Whether [`quit`](WorkQueue::quit) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.quit();
        // Worker threads hold an Arc to the queue, so by the time drop
        // runs the handle set is already empty or the threads are gone.
    }
}
