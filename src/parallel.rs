//! # Parallel node: fan out all steps, join on the last completion.
//!
//! [`Parallel`] dispatches every registered step when started. Steps run
//! concurrently when the queue has several workers, and in unspecified
//! relative order in any case; callers must not depend on it. When the
//! last step completes, the node terminates and notifies its parent once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::event::Priority;
use crate::node::{step_fn, Node, NodeCore, Status, StepBody, StepResult};
use crate::queue::WorkQueue;

/// # Fan-out/join over a set of steps.
///
/// The join counter is armed at push time and decremented on every
/// completion; the terminal transition happens on whichever worker
/// observes it reach zero. The counter re-arms on termination so the node
/// can be started again once quiescent.
pub struct Parallel {
    core: NodeCore,
    scheduled: AtomicU64,
    this: Weak<Parallel>,
}

impl Parallel {
    /// Creates a parallel node bound to `queue` with a default priority.
    pub fn new(queue: &Arc<WorkQueue>, priority: Priority) -> Arc<Self> {
        let queue = queue.clone();
        Arc::new_cyclic(|this| Self {
            core: NodeCore::new(queue, priority),
            scheduled: AtomicU64::new(0),
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

    /// Registers a step.
    pub fn push(&self, func: impl FnMut() -> StepResult + Send + 'static) -> &Self {
        self.push_after(Duration::ZERO, func)
    }

    /// Registers a step dispatched `delay` after start.
    pub fn push_after(
        &self,
        delay: Duration,
        func: impl FnMut() -> StepResult + Send + 'static,
    ) -> &Self {
        self.scheduled.fetch_add(1, Ordering::AcqRel);
        self.core.push_step(delay, StepBody::Call(step_fn(func)));
        self
    }

    /// Registers a child node as one of the branches.
    pub fn push_node<N: Node + 'static>(&self, child: &Arc<N>) -> &Self {
        self.push_node_after(Duration::ZERO, child)
    }

    /// Registers a child node dispatched `delay` after start.
    pub fn push_node_after<N: Node + 'static>(&self, delay: Duration, child: &Arc<N>) -> &Self {
        child.bind_parent(self.owner());
        self.scheduled.fetch_add(1, Ordering::AcqRel);
        let child: Arc<dyn Node> = child.clone();
        self.core.push_step(delay, StepBody::Child(child));
        self
    }

    /// Dispatches every registered step.
    ///
    /// With steps already in flight this only re-activates the node.
    pub fn start(&self) {
        let owner = self.owner();
        let mut st = self.core.state.lock();
        st.status = Status::Active;
        if self.core.outstanding.load(Ordering::Acquire) == 0 {
            for step in st.steps.iter_mut() {
                step.dispatch(owner.clone());
            }
        }
    }

    /// Cancels every pending step, terminates, and notifies the parent.
    pub fn stop(&self) {
        self.core.cancel_all();
        self.terminate();
    }

    /// Current execution state.
    pub fn status(&self) -> Status {
        self.core.status()
    }

    fn terminate(&self) {
        self.scheduled
            .store(self.core.step_count() as u64, Ordering::Release);
        if let Some(parent) = self.core.finish() {
            parent.complete(StepResult::Next);
        }
    }
}

impl Node for Parallel {
    fn start(&self) {
        Parallel::start(self);
    }

    fn stop(&self) {
        Parallel::stop(self);
    }

    fn complete(&self, _result: StepResult) {
        // Join semantics: the step's own result does not steer a fan-out;
        // any completion counts once against the join.
        self.core.outstanding.fetch_sub(1, Ordering::AcqRel);
        if self.scheduled.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.terminate();
        }
    }

    fn bind_parent(&self, parent: Weak<dyn Node>) {
        *self.core.parent.lock() = Some(parent);
    }

    fn begin_step(&self) {
        self.core.outstanding.fetch_add(1, Ordering::AcqRel);
    }
}
