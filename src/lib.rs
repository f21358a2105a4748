//! # workq
//!
//! **Workq** is a priority-aware work queue with composable coroutine
//! combinators.
//!
//! The queue dispatches `{priority, callable}` events from any number of
//! producers to any number of worker threads, with strict priority
//! ordering, FIFO order within a priority, and a timer set for delayed
//! events. The combinators express control flow over asynchronous steps
//! without blocking workers: each step is a short event, and completing
//! one step enqueues the next.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------------|-------------------------------------------|
//! | **Work queue**    | Prioritized FIFO + timer set, submit/cancel/quit, worker threads.  | [`WorkQueue`], [`Event`], [`EventRef`]    |
//! | **Sequence**      | Ordered steps with retry/suspend/resume and child nodes.           | [`Coroutine`], [`StepResult`], [`Node`]   |
//! | **Parallel**      | Fan out all steps, join on the last completion.                    | [`Parallel`]                              |
//! | **Switch**        | Keyed dispatch to one of N branches.                               | [`Switch`]                                |
//! | **Loop**          | Repeat a body sequence a fixed number of times.                    | [`Loop`]                                  |
//! | **Interval**      | Periodic fan-out of callables at a fixed cadence.                  | [`IntervalTimer`]                         |
//! | **Observability** | Hook into queue lifecycle notices.                                 | [`Observer`], [`Notice`]                  |
//! | **Errors**        | Typed errors for submission and dispatch.                          | [`QueueError`]                            |
//! | **Configuration** | Worker count and thread naming.                                    | [`QueueConfig`]                           |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] observer _(demo/reference only)_.
//!
//! ```
//! use std::sync::mpsc;
//! use workq::{Coroutine, StepResult, WorkQueue};
//!
//! let queue = WorkQueue::new();
//! let (tx, rx) = mpsc::channel();
//!
//! // A two-step pipeline: each step runs as its own queue event.
//! let t1 = tx.clone();
//! let t2 = tx;
//! let co = Coroutine::new(&queue, 0);
//! co.push(move || {
//!     t1.send("step one").unwrap();
//!     StepResult::Next
//! })
//! .push(move || {
//!     t2.send("step two").unwrap();
//!     StepResult::End
//! })
//! .start();
//!
//! queue.start(1);
//! assert_eq!(rx.recv().unwrap(), "step one");
//! assert_eq!(rx.recv().unwrap(), "step two");
//! queue.stop();
//! ```
//!
//! ---

mod config;
mod error;
mod event;
mod fifo;
mod interval;
mod looped;
mod node;
mod observer;
mod parallel;
mod queue;
mod sequence;
mod switch;
mod timer;

// ---- Public re-exports ----

pub use config::QueueConfig;
pub use error::QueueError;
pub use event::{Event, EventRef, Priority};
pub use interval::IntervalTimer;
pub use looped::Loop;
pub use node::{Node, Status, StepResult};
pub use observer::{Notice, NoticeKind, Observer};
pub use parallel::Parallel;
pub use queue::WorkQueue;
pub use sequence::Coroutine;
pub use switch::Switch;

// Optional: expose a simple built-in stdout observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observer::LogWriter;
