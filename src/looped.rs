//! # Loop node: run a body sequence a fixed number of times.
//!
//! A [`Loop`] executes its body steps like a sequence; completing the
//! last body step counts one full pass. After the configured number of
//! passes the node terminates and notifies its parent, otherwise the
//! program counter rewinds and the first body step is dispatched again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::event::Priority;
use crate::node::{step_fn, Node, NodeCore, Status, StepBody, StepResult};
use crate::queue::WorkQueue;

/// # Counted repetition of a body sequence.
///
/// [`Retry`](StepResult::Retry) inside a body step re-runs that step only;
/// the pass counter moves when a full pass over the body completes.
pub struct Loop {
    core: NodeCore,
    total: AtomicU64,
    remaining: AtomicU64,
    this: Weak<Loop>,
}

impl Loop {
    /// Creates a loop bound to `queue` with a default priority and a
    /// count of 1.
    pub fn new(queue: &Arc<WorkQueue>, priority: Priority) -> Arc<Self> {
        let queue = queue.clone();
        Arc::new_cyclic(|this| Self {
            core: NodeCore::new(queue, priority),
            total: AtomicU64::new(1),
            remaining: AtomicU64::new(1),
            this: this.clone(),
        })
    }

    fn owner(&self) -> Weak<dyn Node> {
        self.this.clone()
    }

    /// Sets how many passes over the body to run.
    pub fn with_count(&self, count: u64) -> &Self {
        self.total.store(count, Ordering::Release);
        self.remaining.store(count, Ordering::Release);
        self
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

    /// Appends a body step.
    pub fn push(&self, func: impl FnMut() -> StepResult + Send + 'static) -> &Self {
        self.push_after(Duration::ZERO, func)
    }

    /// Appends a body step dispatched `delay` after it is reached.
    pub fn push_after(
        &self,
        delay: Duration,
        func: impl FnMut() -> StepResult + Send + 'static,
    ) -> &Self {
        self.core.push_step(delay, StepBody::Call(step_fn(func)));
        self
    }

    /// Appends a child node as a body step.
    pub fn push_node<N: Node + 'static>(&self, child: &Arc<N>) -> &Self {
        child.bind_parent(self.owner());
        let child: Arc<dyn Node> = child.clone();
        self.core.push_step(Duration::ZERO, StepBody::Child(child));
        self
    }

    /// Begins execution from the program counter.
    pub fn start(&self) {
        self.core.activate(self.owner());
    }

    /// Cancels the pending step, terminates, and notifies the parent.
    pub fn stop(&self) {
        self.core.cancel_current();
        self.terminate();
    }

    /// Marks the node suspended; nothing further is dispatched until
    /// [`resume`](Loop::resume).
    pub fn suspend(&self) {
        self.core.park();
    }

    /// Re-activates a suspended node and re-dispatches the step at the
    /// program counter.
    pub fn resume(&self) {
        self.core.unpark(self.owner());
    }

    /// Current execution state.
    pub fn status(&self) -> Status {
        self.core.status()
    }

    /// Loop guard: one full pass is done.
    fn pass_end(&self) {
        let before = self.remaining.fetch_sub(1, Ordering::AcqRel);
        if before <= 1 {
            self.terminate();
            return;
        }
        let owner = self.owner();
        let mut st = self.core.state.lock();
        st.pc = 0;
        if st.status == Status::Active {
            if let Some(step) = st.steps.get_mut(0) {
                step.dispatch(owner);
            }
        }
    }

    fn terminate(&self) {
        self.remaining
            .store(self.total.load(Ordering::Acquire), Ordering::Release);
        if let Some(parent) = self.core.finish() {
            parent.complete(StepResult::Next);
        }
    }
}

impl Node for Loop {
    fn start(&self) {
        Loop::start(self);
    }

    fn stop(&self) {
        Loop::stop(self);
    }

    fn complete(&self, result: StepResult) {
        self.core.outstanding.fetch_sub(1, Ordering::AcqRel);
        match result {
            StepResult::End => self.terminate(),
            StepResult::Submit => self.core.park(),
            StepResult::Retry => {
                if self.core.advance(self.owner(), 0) {
                    self.terminate();
                }
            }
            StepResult::Next => {
                let owner = self.owner();
                let wrapped = {
                    let mut st = self.core.state.lock();
                    if st.pc + 1 < st.steps.len() {
                        st.pc += 1;
                        if st.status == Status::Active {
                            let pc = st.pc;
                            st.steps[pc].dispatch(owner);
                        }
                        false
                    } else {
                        true
                    }
                };
                if wrapped {
                    self.pass_end();
                }
            }
        }
    }

    fn bind_parent(&self, parent: Weak<dyn Node>) {
        *self.core.parent.lock() = Some(parent);
    }

    fn begin_step(&self) {
        self.core.outstanding.fetch_add(1, Ordering::AcqRel);
    }
}
