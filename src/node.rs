//! # Shared machinery for coroutine nodes.
//!
//! Combinators ([`Coroutine`], [`Parallel`], [`Switch`], [`Loop`]) are
//! nodes in a dynamic tree: a parent schedules a child as one of its
//! steps and the child reports back exactly once when it terminates.
//! [`Node`] is that completion protocol.
//!
//! Two rules keep the tree sound regardless of how deep it nests:
//!
//! - **Every step is dispatched through the work queue.** A node never
//!   invokes a step inline from [`complete`](Node::complete); it submits
//!   an event and lets a worker pick it up. Stack depth stays bounded no
//!   matter how long a chain of synchronously-completing steps gets.
//! - **The trampoline holds the node weakly.** A step event closes over a
//!   `Weak` handle; if the node is gone by dispatch time the event is a
//!   no-op instead of a dangling callback.
//!
//! [`Coroutine`]: crate::Coroutine
//! [`Parallel`]: crate::Parallel
//! [`Switch`]: crate::Switch
//! [`Loop`]: crate::Loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::event::{Event, EventRef, Priority};
use crate::WorkQueue;

/// Outcome of a step body, driving what its node does next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepResult {
    /// Terminate the node and go idle.
    End,
    /// Hand control to an external party; the node parks until resumed.
    Submit,
    /// Run this same step again.
    Retry,
    /// Advance to the next step (terminates past the last one).
    Next,
}

/// Execution state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Idle,
    Active,
    Suspended,
}

/// The completion protocol between nodes.
///
/// Implemented by every combinator; implement it yourself to plug a
/// custom combinator into the tree. [`complete`](Node::complete) and
/// [`begin_step`](Node::begin_step) are the protocol plumbing: step
/// trampolines call `begin_step` before running a body, and each
/// terminating child calls its parent's `complete` with
/// [`StepResult::Next`] exactly once.
pub trait Node: Send + Sync {
    /// Begins (or re-activates) execution.
    fn start(&self);

    /// Cancels pending work and terminates.
    fn stop(&self);

    /// Reports a step outcome; also the child-termination entry point.
    fn complete(&self, result: StepResult);

    /// Records the parent to notify at termination.
    fn bind_parent(&self, parent: Weak<dyn Node>);

    /// Accounts for a step entering flight.
    fn begin_step(&self);
}

pub(crate) type StepFn = Arc<Mutex<Box<dyn FnMut() -> StepResult + Send>>>;

pub(crate) fn step_fn(func: impl FnMut() -> StepResult + Send + 'static) -> StepFn {
    Arc::new(Mutex::new(Box::new(func)))
}

#[derive(Clone)]
pub(crate) enum StepBody {
    Call(StepFn),
    Child(Arc<dyn Node>),
}

/// One registered step: where it runs, how urgently, after what delay,
/// and what it does. `current` remembers the scheduled event so a stop
/// can cancel it.
pub(crate) struct StepSpec {
    queue: Arc<WorkQueue>,
    priority: Priority,
    delay: Duration,
    body: StepBody,
    current: Option<EventRef>,
}

impl StepSpec {
    pub(crate) fn new(
        queue: Arc<WorkQueue>,
        priority: Priority,
        delay: Duration,
        body: StepBody,
    ) -> Self {
        Self {
            queue,
            priority,
            delay,
            body,
            current: None,
        }
    }

    /// Schedules this step on its queue, trampolining back into `owner`.
    ///
    /// A `Call` body runs and reports its result through
    /// [`Node::complete`]. A `Child` body starts the child and leaves the
    /// owner's in-flight count raised; the child's own termination
    /// supplies the completion.
    pub(crate) fn dispatch(&mut self, owner: Weak<dyn Node>) {
        let body = self.body.clone();
        let ev = Event::new(self.priority, move || {
            let Some(node) = owner.upgrade() else {
                return;
            };
            node.begin_step();
            match &body {
                StepBody::Call(func) => {
                    let result = {
                        let mut call = func.lock();
                        (*call)()
                    };
                    node.complete(result);
                }
                StepBody::Child(child) => child.start(),
            }
        });
        let submitted = if self.delay.is_zero() {
            self.queue.submit(ev)
        } else {
            self.queue.submit_after(self.delay, ev)
        };
        // A step landing after queue shutdown is shed, just as quit sheds
        // pending work.
        self.current = submitted.ok();
    }

    /// Cancels the scheduled event, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some(ev) = self.current.take() {
            self.queue.cancel(&ev);
        }
    }
}

pub(crate) struct Defaults {
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) priority: Priority,
}

pub(crate) struct NodeState {
    pub(crate) status: Status,
    pub(crate) pc: usize,
    pub(crate) steps: Vec<StepSpec>,
}

/// Fields and transitions shared by the sequential combinators.
pub(crate) struct NodeCore {
    pub(crate) defaults: Mutex<Defaults>,
    pub(crate) state: Mutex<NodeState>,
    pub(crate) outstanding: AtomicU64,
    pub(crate) parent: Mutex<Option<Weak<dyn Node>>>,
}

impl NodeCore {
    pub(crate) fn new(queue: Arc<WorkQueue>, priority: Priority) -> Self {
        Self {
            defaults: Mutex::new(Defaults { queue, priority }),
            state: Mutex::new(NodeState {
                status: Status::Idle,
                pc: 0,
                steps: Vec::new(),
            }),
            outstanding: AtomicU64::new(0),
            parent: Mutex::new(None),
        }
    }

    /// Appends a step built from the current defaults.
    pub(crate) fn push_step(&self, delay: Duration, body: StepBody) {
        let (queue, priority) = {
            let d = self.defaults.lock();
            (d.queue.clone(), d.priority)
        };
        self.state
            .lock()
            .steps
            .push(StepSpec::new(queue, priority, delay, body));
    }

    /// `start` transition: go active and, unless a step (or child) is
    /// already in flight, dispatch the step at `pc`.
    pub(crate) fn activate(&self, owner: Weak<dyn Node>) {
        let mut st = self.state.lock();
        st.status = Status::Active;
        if self.outstanding.load(Ordering::Acquire) == 0 {
            let pc = st.pc;
            if let Some(step) = st.steps.get_mut(pc) {
                step.dispatch(owner);
            }
        }
    }

    /// Moves `pc` forward by `add` and dispatches when active.
    ///
    /// Returns true when the move runs past the last step, i.e. the node
    /// is terminal and the caller must finish.
    pub(crate) fn advance(&self, owner: Weak<dyn Node>, add: usize) -> bool {
        let mut st = self.state.lock();
        if st.pc + add < st.steps.len() {
            st.pc += add;
            if st.status == Status::Active {
                let pc = st.pc;
                st.steps[pc].dispatch(owner);
            }
            false
        } else {
            true
        }
    }

    /// Terminal transition: idle, rewind, hand back the parent to notify.
    ///
    /// The parent call happens at the caller with no locks held.
    #[must_use]
    pub(crate) fn finish(&self) -> Option<Arc<dyn Node>> {
        {
            let mut st = self.state.lock();
            st.status = Status::Idle;
            st.pc = 0;
        }
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn park(&self) {
        self.state.lock().status = Status::Suspended;
    }

    /// Re-dispatches the step at `pc` if the node is suspended.
    pub(crate) fn unpark(&self, owner: Weak<dyn Node>) {
        let mut st = self.state.lock();
        if st.status != Status::Suspended {
            return;
        }
        st.status = Status::Active;
        let pc = st.pc;
        if let Some(step) = st.steps.get_mut(pc) {
            step.dispatch(owner);
        }
    }

    /// Cancels the event scheduled for the step at `pc`, if any.
    pub(crate) fn cancel_current(&self) {
        let mut st = self.state.lock();
        let pc = st.pc;
        if let Some(step) = st.steps.get_mut(pc) {
            step.cancel();
        }
    }

    pub(crate) fn cancel_all(&self) {
        for step in self.state.lock().steps.iter_mut() {
            step.cancel();
        }
    }

    pub(crate) fn status(&self) -> Status {
        self.state.lock().status
    }

    pub(crate) fn step_count(&self) -> usize {
        self.state.lock().steps.len()
    }
}
