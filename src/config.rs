//! # Work queue configuration.
//!
//! [`QueueConfig`] centralizes the knobs a [`WorkQueue`] is built with:
//! how many worker threads [`start`] spawns by default and how those
//! threads are named.
//!
//! # Example
//! ```
//! use workq::QueueConfig;
//!
//! let mut cfg = QueueConfig::default();
//! cfg.workers = 2;
//! cfg.thread_name = "pipeline".into();
//!
//! assert_eq!(cfg.workers, 2);
//! ```
//!
//! [`WorkQueue`]: crate::WorkQueue
//! [`start`]: crate::WorkQueue::start

use std::borrow::Cow;

/// Configuration for a [`WorkQueue`](crate::WorkQueue).
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Worker threads spawned when [`start`](crate::WorkQueue::start)
    /// is called with `0` (0 = one per CPU core).
    pub workers: usize,
    /// Prefix for worker thread names (`{thread_name}-{index}`).
    pub thread_name: Cow<'static, str>,
}

impl Default for QueueConfig {
    /// Provides a default configuration:
    /// - `workers = 0` (one per CPU core)
    /// - `thread_name = "workq"`
    fn default() -> Self {
        Self {
            workers: 0,
            thread_name: Cow::Borrowed("workq"),
        }
    }
}
