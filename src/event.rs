//! # Events: the unit of work dispatched by the queue.
//!
//! An [`Event`] pairs a priority with a callable. The common handle type
//! is [`EventRef`], an `Arc<Event>` that doubles as the event's identity:
//! the queue compares handles with `Arc::ptr_eq` when canceling.
//!
//! The callable slot is a mutex-guarded `FnMut` so an event can be
//! invoked through a shared handle, and re-invoked: re-submission of the
//! same event is permitted and the periodic combinators rely on it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::QueueError;

/// Scheduling priority. `0` is the highest; larger values run later.
///
/// Ordering across priorities is strict: a ready event at priority 1 is
/// never dispatched while one at priority 0 is waiting.
pub type Priority = u32;

/// Shared handle to an [`Event`].
///
/// Keep a clone if you may want to [`cancel`](crate::WorkQueue::cancel)
/// the event later; the handle itself is the cancellation key.
pub type EventRef = Arc<Event>;

type Callable = Box<dyn FnMut() + Send>;

/// # A prioritized unit of work.
///
/// The priority is fixed at construction; the callable may be bound late
/// via [`bind`](Event::bind) (an event built with [`Event::unbound`] and
/// dispatched before binding fails with [`QueueError::InvalidCallable`]).
pub struct Event {
    priority: Priority,
    func: Mutex<Option<Callable>>,
}

impl Event {
    /// Creates an event with a bound callable and returns a shared handle.
    ///
    /// # Example
    /// ```
    /// use workq::Event;
    ///
    /// let ev = Event::new(3, || println!("hello"));
    /// assert_eq!(ev.priority(), 3);
    /// ```
    pub fn new(priority: Priority, func: impl FnMut() + Send + 'static) -> EventRef {
        Arc::new(Self {
            priority,
            func: Mutex::new(Some(Box::new(func))),
        })
    }

    /// Creates an event without a callable; bind one before it is dispatched.
    pub fn unbound(priority: Priority) -> EventRef {
        Arc::new(Self {
            priority,
            func: Mutex::new(None),
        })
    }

    /// Installs or replaces the callable.
    pub fn bind(&self, func: impl FnMut() + Send + 'static) {
        *self.func.lock() = Some(Box::new(func));
    }

    /// Returns the event's priority.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Runs the bound callable.
    ///
    /// # Errors
    ///
    /// [`QueueError::InvalidCallable`] when no callable is bound.
    pub fn invoke(&self) -> Result<(), QueueError> {
        let mut slot = self.func.lock();
        match slot.as_mut() {
            Some(func) => {
                func();
                Ok(())
            }
            None => Err(QueueError::InvalidCallable),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("priority", &self.priority)
            .field("bound", &self.func.lock().is_some())
            .finish()
    }
}
