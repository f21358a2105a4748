//! # Error types used by the work queue.
//!
//! [`QueueError`] is the closed set of failures the queue itself can
//! surface. Step bodies are opaque to the library: whatever they do with
//! their own errors is the caller's concern, and a panicking body
//! terminates the dispatching worker (see [`WorkQueue::run`]).
//!
//! [`WorkQueue::run`]: crate::WorkQueue::run

use thiserror::Error;

/// # Errors produced by the work queue.
///
/// Submission and dispatch are the only fallible operations; everything
/// else (cancel, quit, stop) is a no-op when it has nothing to do.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was shut down; the event was not enqueued.
    #[error("work queue is shut down")]
    ShutDown,

    /// An event with no bound callable was dispatched.
    ///
    /// This is a programmer error: either the event was created with
    /// [`Event::unbound`](crate::Event::unbound) and never bound,
    /// or it was dispatched before binding. Workers treat it as fatal.
    #[error("event has no bound callable")]
    InvalidCallable,
}

impl QueueError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::ShutDown => "queue_shut_down",
            QueueError::InvalidCallable => "queue_invalid_callable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(QueueError::ShutDown.as_label(), "queue_shut_down");
        assert_eq!(
            QueueError::InvalidCallable.as_label(),
            "queue_invalid_callable"
        );
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(QueueError::ShutDown.to_string(), "work queue is shut down");
    }
}
