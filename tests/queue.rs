//! Work queue ordering, timing, cancellation, and shutdown behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use workq::{QueueConfig, QueueError, WorkQueue};

#[test]
fn higher_priority_always_dispatches_first() {
    let queue = WorkQueue::new();
    let (tx, rx) = mpsc::channel();

    // Everything is queued before any worker exists, so dispatch order is
    // decided by the queue alone.
    let low = tx.clone();
    queue.submit_fn(7, move || low.send("low").unwrap()).unwrap();
    let high = tx.clone();
    queue.submit_fn(0, move || high.send("high").unwrap()).unwrap();
    let mid = tx;
    queue.submit_fn(3, move || mid.send("mid").unwrap()).unwrap();

    queue.start(1);
    let order: Vec<_> = (0..3)
        .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
        .collect();
    assert_eq!(order, vec!["high", "mid", "low"]);
    queue.stop();
}

#[test]
fn submission_order_holds_within_a_priority() {
    let queue = WorkQueue::new();
    let (tx, rx) = mpsc::channel();

    for i in 0..20 {
        let tx = tx.clone();
        queue.submit_fn(1, move || tx.send(i).unwrap()).unwrap();
    }

    queue.start(1);
    let order: Vec<_> = (0..20)
        .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
        .collect();
    assert_eq!(order, (0..20).collect::<Vec<_>>());
    queue.stop();
}

#[test]
fn delayed_event_fires_no_earlier_than_its_delay() {
    let queue = WorkQueue::with_config(QueueConfig {
        workers: 1,
        ..QueueConfig::default()
    });
    queue.start(0);

    let (tx, rx) = mpsc::channel();
    let begin = Instant::now();
    queue
        .submit_after_fn(Duration::from_millis(50), 0, move || {
            tx.send(Instant::now()).unwrap();
        })
        .unwrap();

    let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let elapsed = fired.duration_since(begin);
    assert!(elapsed >= Duration::from_millis(50), "fired early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "fired late: {elapsed:?}");
    queue.stop();
}

#[test]
fn earlier_timer_overtakes_a_later_one() {
    let queue = WorkQueue::new();
    let (tx, rx) = mpsc::channel();

    queue.start(1);
    let late = tx.clone();
    queue
        .submit_after_fn(Duration::from_millis(120), 0, move || {
            late.send("late").unwrap();
        })
        .unwrap();
    let soon = tx;
    queue
        .submit_after_fn(Duration::from_millis(30), 0, move || {
            soon.send("soon").unwrap();
        })
        .unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "soon");
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "late");
    queue.stop();
}

#[test]
fn cancel_before_the_deadline_suppresses_the_event() {
    let queue = WorkQueue::new();
    let hits = Arc::new(AtomicUsize::new(0));

    queue.start(1);
    let h = hits.clone();
    let ev = queue
        .submit_after_fn(Duration::from_millis(100), 0, move || {
            h.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    std::thread::sleep(Duration::from_millis(10));
    assert!(queue.cancel(&ev));
    // Second cancel of the same handle is a safe no-op.
    assert!(!queue.cancel(&ev));

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    queue.stop();
}

#[test]
fn workers_return_after_quit_despite_pending_work() {
    let queue = WorkQueue::new();

    queue
        .submit_after_fn(Duration::from_secs(300), 0, || {})
        .unwrap();
    queue.start(4);
    std::thread::sleep(Duration::from_millis(20));

    let begin = Instant::now();
    queue.stop();
    assert!(begin.elapsed() < Duration::from_secs(5));
    assert_eq!(queue.submit_fn(0, || {}).unwrap_err(), QueueError::ShutDown);
}

#[test]
fn many_events_drain_across_workers() {
    let queue = WorkQueue::new();
    let hits = Arc::new(AtomicUsize::new(0));

    queue.start(4);
    for _ in 0..500 {
        let h = hits.clone();
        queue
            .submit_fn(1, move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let begin = Instant::now();
    while hits.load(Ordering::SeqCst) < 500 {
        assert!(begin.elapsed() < Duration::from_secs(10), "events lost");
        std::thread::sleep(Duration::from_millis(5));
    }
    queue.stop();
}
