//! # Switch node: keyed dispatch to one of N branches.
//!
//! A [`Switch`] runs a selector callable through the queue, looks the
//! returned key up in its branch map, and dispatches the matching branch.
//! A key with no branch terminates the switch. There is exactly one
//! branch per key; after the branch completes the switch terminates and
//! notifies its parent; there is no sequence beyond the branch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::event::{Event, EventRef, Priority};
use crate::node::{step_fn, Defaults, Node, Status, StepBody, StepResult, StepSpec};
use crate::queue::WorkQueue;

type SelectorFn<K> = Arc<Mutex<Box<dyn FnMut() -> K + Send>>>;

struct SwitchState<K> {
    status: Status,
    selector: Option<SelectorFn<K>>,
    selector_event: Option<EventRef>,
    branches: BTreeMap<K, StepSpec>,
    current: Option<K>,
}

/// # Keyed branch dispatch.
///
/// Branch results: [`Retry`](StepResult::Retry) re-runs the branch (not
/// the selector); [`Next`](StepResult::Next) and [`End`](StepResult::End)
/// terminate the switch; a child branch terminates it when the child
/// completes.
pub struct Switch<K> {
    defaults: Mutex<Defaults>,
    state: Mutex<SwitchState<K>>,
    outstanding: AtomicU64,
    parent: Mutex<Option<Weak<dyn Node>>>,
    this: Weak<Switch<K>>,
}

impl<K: Ord + Clone + Send + 'static> Switch<K> {
    /// Creates a switch bound to `queue` with a default priority.
    pub fn new(queue: &Arc<WorkQueue>, priority: Priority) -> Arc<Self> {
        let queue = queue.clone();
        Arc::new_cyclic(|this| Self {
            defaults: Mutex::new(Defaults { queue, priority }),
            state: Mutex::new(SwitchState {
                status: Status::Idle,
                selector: None,
                selector_event: None,
                branches: BTreeMap::new(),
                current: None,
            }),
            outstanding: AtomicU64::new(0),
            parent: Mutex::new(None),
            this: this.clone(),
        })
    }

    fn owner(&self) -> Weak<dyn Node> {
        self.this.clone()
    }

    /// Sets the callable producing the branch key.
    pub fn selector(&self, func: impl FnMut() -> K + Send + 'static) -> &Self {
        self.state.lock().selector = Some(Arc::new(Mutex::new(Box::new(func))));
        self
    }

    /// Registers the branch for `key`.
    pub fn then(&self, key: K, func: impl FnMut() -> StepResult + Send + 'static) -> &Self {
        let (queue, priority) = self.spec_defaults();
        let spec = StepSpec::new(queue, priority, Duration::ZERO, StepBody::Call(step_fn(func)));
        self.state.lock().branches.insert(key, spec);
        self
    }

    /// Registers a child node as the branch for `key`.
    pub fn then_node<N: Node + 'static>(&self, key: K, child: &Arc<N>) -> &Self {
        child.bind_parent(self.owner());
        let child: Arc<dyn Node> = child.clone();
        let (queue, priority) = self.spec_defaults();
        let spec = StepSpec::new(queue, priority, Duration::ZERO, StepBody::Child(child));
        self.state.lock().branches.insert(key, spec);
        self
    }

    fn spec_defaults(&self) -> (Arc<WorkQueue>, Priority) {
        let d = self.defaults.lock();
        (d.queue.clone(), d.priority)
    }

    /// Dispatches the selector through the queue.
    pub fn start(&self) {
        let (queue, priority) = self.spec_defaults();
        let weak = self.this.clone();
        let ev = Event::new(priority, move || {
            if let Some(node) = weak.upgrade() {
                node.select();
            }
        });
        let mut st = self.state.lock();
        st.status = Status::Active;
        st.selector_event = queue.submit(ev).ok();
    }

    /// Cancels the pending selector or branch, terminates, and notifies
    /// the parent.
    pub fn stop(&self) {
        {
            let mut st = self.state.lock();
            if let Some(ev) = st.selector_event.take() {
                self.defaults.lock().queue.cancel(&ev);
            }
            if let Some(key) = st.current.clone() {
                if let Some(step) = st.branches.get_mut(&key) {
                    step.cancel();
                }
            }
        }
        self.terminate();
    }

    /// Current execution state.
    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    fn select(&self) {
        let func = { self.state.lock().selector.clone() };
        let Some(func) = func else {
            // No selector configured: nothing to key on.
            self.terminate();
            return;
        };
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        let key = {
            let mut select = func.lock();
            (*select)()
        };
        self.outstanding.fetch_sub(1, Ordering::AcqRel);

        let owner = self.owner();
        let matched = {
            let mut st = self.state.lock();
            match st.branches.get_mut(&key) {
                Some(step) => {
                    step.dispatch(owner);
                    st.current = Some(key);
                    true
                }
                None => false,
            }
        };
        if !matched {
            self.terminate();
        }
    }

    fn redispatch(&self) {
        let owner = self.owner();
        let mut st = self.state.lock();
        if let Some(key) = st.current.clone() {
            if let Some(step) = st.branches.get_mut(&key) {
                step.dispatch(owner);
            }
        }
    }

    fn terminate(&self) {
        {
            let mut st = self.state.lock();
            st.status = Status::Idle;
            st.current = None;
            st.selector_event = None;
        }
        let parent = self.parent.lock().as_ref().and_then(Weak::upgrade);
        if let Some(parent) = parent {
            parent.complete(StepResult::Next);
        }
    }
}

impl<K: Ord + Clone + Send + 'static> Node for Switch<K> {
    fn start(&self) {
        Switch::start(self);
    }

    fn stop(&self) {
        Switch::stop(self);
    }

    fn complete(&self, result: StepResult) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        match result {
            StepResult::Retry => self.redispatch(),
            StepResult::Submit => self.state.lock().status = Status::Suspended,
            StepResult::Next | StepResult::End => self.terminate(),
        }
    }

    fn bind_parent(&self, parent: Weak<dyn Node>) {
        *self.parent.lock() = Some(parent);
    }

    fn begin_step(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }
}
