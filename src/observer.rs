//! # Queue lifecycle notices and the observer hook.
//!
//! A [`WorkQueue`] built with [`with_observer`] reports what it is doing
//! (submissions, dispatches, cancellations, worker lifecycle) as
//! [`Notice`]s. The hook runs synchronously on the calling thread, outside
//! the queue lock; keep implementations cheap.
//!
//! [`WorkQueue`]: crate::WorkQueue
//! [`with_observer`]: crate::WorkQueue::with_observer

use std::time::{Duration, SystemTime};

use crate::event::Priority;

/// What happened inside the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Submitted,
    TimerScheduled,
    Dispatched,
    Canceled,
    ShutdownRequested,
    WorkerStarted,
    WorkerExited,
}

/// A single lifecycle notice.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub priority: Option<Priority>,
    pub delay: Option<Duration>,
    pub worker: Option<usize>,
    pub found: Option<bool>,
    pub at: SystemTime,
}

impl Notice {
    pub fn now(kind: NoticeKind) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            priority: None,
            delay: None,
            worker: None,
            found: None,
        }
    }

    pub fn with_priority(mut self, p: Priority) -> Self {
        self.priority = Some(p);
        self
    }

    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    pub fn with_worker(mut self, index: usize) -> Self {
        self.worker = Some(index);
        self
    }

    pub fn with_found(mut self, found: bool) -> Self {
        self.found = Some(found);
        self
    }
}

/// Hook into queue lifecycle notices (logging, metrics, custom observers).
pub trait Observer: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Simple stdout logging observer.
///
/// Enabled via the `logging` feature. Prints human-readable notice lines
/// for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Observer`] for
/// structured logging or metrics collection.
///
/// ## Output format
/// ```text
/// [submit] priority=0
/// [schedule] priority=0 delay=50ms
/// [dispatch] priority=0
/// [cancel] found=true
/// [shutdown-requested]
/// [worker-started] index=0
/// [worker-exited] index=0
/// ```
#[cfg(feature = "logging")]
pub struct LogWriter;

#[cfg(feature = "logging")]
impl Observer for LogWriter {
    fn notify(&self, n: &Notice) {
        match n.kind {
            NoticeKind::Submitted => {
                println!("[submit] priority={:?}", n.priority.unwrap_or_default());
            }
            NoticeKind::TimerScheduled => {
                println!(
                    "[schedule] priority={:?} delay={:?}",
                    n.priority.unwrap_or_default(),
                    n.delay.unwrap_or_default()
                );
            }
            NoticeKind::Dispatched => {
                println!("[dispatch] priority={:?}", n.priority.unwrap_or_default());
            }
            NoticeKind::Canceled => {
                println!("[cancel] found={:?}", n.found.unwrap_or_default());
            }
            NoticeKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            NoticeKind::WorkerStarted => {
                println!("[worker-started] index={:?}", n.worker.unwrap_or_default());
            }
            NoticeKind::WorkerExited => {
                println!("[worker-exited] index={:?}", n.worker.unwrap_or_default());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_the_optional_fields() {
        let n = Notice::now(NoticeKind::TimerScheduled)
            .with_priority(2)
            .with_delay(Duration::from_millis(5));

        assert_eq!(n.kind, NoticeKind::TimerScheduled);
        assert_eq!(n.priority, Some(2));
        assert_eq!(n.delay, Some(Duration::from_millis(5)));
        assert_eq!(n.worker, None);
    }
}
