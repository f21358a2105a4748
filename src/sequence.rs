//! # Sequence node: ordered steps with a program counter.
//!
//! A [`Coroutine`] runs its steps one at a time. Each step is a short
//! callable dispatched through the work queue; its [`StepResult`] decides
//! whether the node advances, retries, parks, or terminates. A step may
//! also be a child node, in which case the sequence waits for the child
//! to terminate before advancing.
//!
//! # Example
//! ```
//! use std::sync::mpsc;
//! use workq::{Coroutine, StepResult, WorkQueue};
//!
//! let queue = WorkQueue::new();
//! let co = Coroutine::new(&queue, 0);
//!
//! let (tx, rx) = mpsc::channel();
//! let t1 = tx.clone();
//! let t2 = tx;
//! co.push(move || {
//!     t1.send("first").unwrap();
//!     StepResult::Next
//! })
//! .push(move || {
//!     t2.send("second").unwrap();
//!     StepResult::Next
//! })
//! .start();
//!
//! queue.start(1);
//! assert_eq!(rx.recv().unwrap(), "first");
//! assert_eq!(rx.recv().unwrap(), "second");
//! queue.stop();
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::event::Priority;
use crate::node::{step_fn, Node, NodeCore, Status, StepBody, StepResult};
use crate::queue::WorkQueue;

/// # Ordered sequence of steps.
///
/// Construction is chainable: `with_*` set defaults for subsequent
/// pushes, `push`/`push_node` append steps, and `start()` begins
/// execution. At most one step of a sequence is in flight at any time,
/// so step bodies need no synchronization of their own against each
/// other.
pub struct Coroutine {
    core: NodeCore,
    this: Weak<Coroutine>,
}

impl Coroutine {
    /// Creates a sequence bound to `queue` with a default step priority.
    pub fn new(queue: &Arc<WorkQueue>, priority: Priority) -> Arc<Self> {
        let queue = queue.clone();
        Arc::new_cyclic(|this| Self {
            core: NodeCore::new(queue, priority),
            this: this.clone(),
        })
    }

    fn owner(&self) -> Weak<dyn Node> {
        self.this.clone()
    }

    /// Sets the priority used by subsequent pushes.
    pub fn with_priority(&self, priority: Priority) -> &Self {
        self.core.defaults.lock().priority = priority;
        self
    }

    /// Sets the queue used by subsequent pushes.
    pub fn with_queue(&self, queue: &Arc<WorkQueue>) -> &Self {
        self.core.defaults.lock().queue = queue.clone();
        self
    }

    /// Appends a step.
    pub fn push(&self, func: impl FnMut() -> StepResult + Send + 'static) -> &Self {
        self.push_after(Duration::ZERO, func)
    }

    /// Appends a step that is dispatched `delay` after it is reached.
    pub fn push_after(
        &self,
        delay: Duration,
        func: impl FnMut() -> StepResult + Send + 'static,
    ) -> &Self {
        self.core.push_step(delay, StepBody::Call(step_fn(func)));
        self
    }

    /// Appends a step that starts `child` and waits for it to terminate.
    pub fn push_node<N: Node + 'static>(&self, child: &Arc<N>) -> &Self {
        self.push_node_after(Duration::ZERO, child)
    }

    /// Appends a child step dispatched `delay` after it is reached.
    pub fn push_node_after<N: Node + 'static>(&self, delay: Duration, child: &Arc<N>) -> &Self {
        child.bind_parent(self.owner());
        let child: Arc<dyn Node> = child.clone();
        self.core.push_step(delay, StepBody::Child(child));
        self
    }

    /// Marks the node suspended: the step in flight (if any) completes,
    /// but nothing further is dispatched until [`resume`](Coroutine::resume).
    pub fn suspend(&self) {
        self.core.park();
    }

    /// Re-activates a suspended node and re-dispatches the step at the
    /// program counter. A no-op unless the node is suspended.
    pub fn resume(&self) {
        self.core.unpark(self.owner());
    }

    /// Begins execution from the program counter.
    ///
    /// When a step or child is already in flight this only re-activates
    /// the node; nothing is double-dispatched.
    pub fn start(&self) {
        self.core.activate(self.owner());
    }

    /// Cancels the pending step, terminates, and notifies the parent.
    ///
    /// The program counter rewinds to the first step, so a later
    /// [`start`](Coroutine::start) runs the sequence from the beginning.
    pub fn stop(&self) {
        self.core.cancel_current();
        self.terminate();
    }

    /// Current execution state.
    pub fn status(&self) -> Status {
        self.core.status()
    }

    fn terminate(&self) {
        if let Some(parent) = self.core.finish() {
            parent.complete(StepResult::Next);
        }
    }
}

impl Node for Coroutine {
    fn start(&self) {
        Coroutine::start(self);
    }

    fn stop(&self) {
        Coroutine::stop(self);
    }

    fn complete(&self, result: StepResult) {
        self.core.outstanding.fetch_sub(1, std::sync::atomic::Ordering::AcqRel);
        match result {
            StepResult::End => self.terminate(),
            StepResult::Submit => self.core.park(),
            StepResult::Retry => {
                if self.core.advance(self.owner(), 0) {
                    self.terminate();
                }
            }
            StepResult::Next => {
                if self.core.advance(self.owner(), 1) {
                    self.terminate();
                }
            }
        }
    }

    fn bind_parent(&self, parent: Weak<dyn Node>) {
        *self.core.parent.lock() = Some(parent);
    }

    fn begin_step(&self) {
        self.core
            .outstanding
            .fetch_add(1, std::sync::atomic::Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Mutex as StdMutex;

    fn order_probe() -> (Arc<StdMutex<Vec<&'static str>>>, Arc<StdMutex<Vec<&'static str>>>) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        (log.clone(), log)
    }

    fn wait_for<F: Fn() -> bool>(cond: F) {
        let begin = std::time::Instant::now();
        while !cond() {
            assert!(
                begin.elapsed() < Duration::from_secs(5),
                "condition not reached in time"
            );
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn steps_run_in_order() {
        let queue = WorkQueue::new();
        let (log, probe) = order_probe();

        let co = Coroutine::new(&queue, 0);
        let (l1, l2, l3) = (log.clone(), log.clone(), log);
        co.push(move || {
            l1.lock().unwrap().push("a");
            StepResult::Next
        })
        .push(move || {
            l2.lock().unwrap().push("b");
            StepResult::Next
        })
        .push(move || {
            l3.lock().unwrap().push("c");
            StepResult::End
        })
        .start();

        queue.start(1);
        wait_for(|| probe.lock().unwrap().len() == 3);
        assert_eq!(*probe.lock().unwrap(), vec!["a", "b", "c"]);
        wait_for(|| co.status() == Status::Idle);
        queue.stop();
    }

    #[test]
    fn retry_reruns_the_same_step() {
        let queue = WorkQueue::new();
        let (tx, rx) = mpsc::channel();

        let co = Coroutine::new(&queue, 0);
        let mut attempts = 0u32;
        let t1 = tx.clone();
        co.push(move || {
            attempts += 1;
            t1.send(("body", attempts)).unwrap();
            if attempts < 3 {
                StepResult::Retry
            } else {
                StepResult::Next
            }
        })
        .push(move || {
            tx.send(("after", 0)).unwrap();
            StepResult::End
        })
        .start();

        queue.start(1);
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        }
        assert_eq!(
            seen,
            vec![("body", 1), ("body", 2), ("body", 3), ("after", 0)]
        );
        queue.stop();
    }

    #[test]
    fn parent_completes_exactly_once() {
        let queue = WorkQueue::new();
        let (tx, rx) = mpsc::channel();

        let child = Coroutine::new(&queue, 0);
        child
            .push(|| StepResult::Next)
            .push(|| StepResult::Next)
            .push(|| StepResult::Next);

        let parent = Coroutine::new(&queue, 0);
        parent.push_node(&child).push(move || {
            tx.send("parent-advanced").unwrap();
            StepResult::End
        });
        parent.start();

        queue.start(1);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            "parent-advanced"
        );
        // Exactly once: nothing further arrives.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        queue.stop();
    }

    #[test]
    fn suspend_holds_the_chain_and_resume_continues_it() {
        let queue = WorkQueue::new();
        let (log, probe) = order_probe();

        let co = Coroutine::new(&queue, 0);
        let handle = co.clone();
        let (l1, l2) = (log.clone(), log);
        co.push(move || {
            l1.lock().unwrap().push("first");
            handle.suspend();
            StepResult::Next
        })
        .push(move || {
            l2.lock().unwrap().push("second");
            StepResult::End
        })
        .start();

        queue.start(1);
        wait_for(|| probe.lock().unwrap().len() == 1);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(*probe.lock().unwrap(), vec!["first"]);
        assert_eq!(co.status(), Status::Suspended);

        co.resume();
        wait_for(|| probe.lock().unwrap().len() == 2);
        assert_eq!(*probe.lock().unwrap(), vec!["first", "second"]);
        queue.stop();
    }

    #[test]
    fn submit_parks_until_resumed() {
        let queue = WorkQueue::new();
        let (log, probe) = order_probe();

        let co = Coroutine::new(&queue, 0);
        let l1 = log.clone();
        let mut handed_off = false;
        co.push(move || {
            l1.lock().unwrap().push("step");
            if handed_off {
                StepResult::Next
            } else {
                handed_off = true;
                StepResult::Submit
            }
        })
        .start();

        queue.start(1);
        wait_for(|| probe.lock().unwrap().len() == 1);
        wait_for(|| co.status() == Status::Suspended);

        // The external signal: re-dispatch the parked step.
        co.resume();
        wait_for(|| probe.lock().unwrap().len() == 2);
        wait_for(|| co.status() == Status::Idle);
        queue.stop();
    }

    #[test]
    fn stop_cancels_the_pending_step() {
        let queue = WorkQueue::new();
        let (log, probe) = order_probe();

        let co = Coroutine::new(&queue, 0);
        let l1 = log.clone();
        let l2 = log;
        co.push(move || {
            l1.lock().unwrap().push("ran");
            StepResult::Next
        })
        .push_after(Duration::from_millis(200), move || {
            l2.lock().unwrap().push("never");
            StepResult::End
        })
        .start();

        queue.start(1);
        wait_for(|| probe.lock().unwrap().len() == 1);
        // Give the completion a moment to arm the delayed second step.
        std::thread::sleep(Duration::from_millis(50));
        co.stop();
        assert_eq!(co.status(), Status::Idle);

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(*probe.lock().unwrap(), vec!["ran"]);
        queue.stop();
    }
}
