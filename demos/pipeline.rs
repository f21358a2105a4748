//! # Composed control flow
//!
//! Demonstrates the whole combinator family under one root sequence:
//! - an inner sequence as a child step
//! - a parallel fan-out holding callables and child sequences
//! - a keyed switch
//! - a counted loop
//!
//! Run with: `cargo run --example pipeline`

use workq::{Coroutine, Loop, Parallel, StepResult, Switch, WorkQueue};

fn main() {
    let queue = WorkQueue::new();

    let inner = Coroutine::new(&queue, 0);
    inner
        .push(|| {
            println!("inner: function 1");
            StepResult::Next
        })
        .push(|| {
            println!("inner: function 2");
            StepResult::Next
        });

    let branch_a = Coroutine::new(&queue, 0);
    branch_a
        .push(|| {
            println!("parallel: a1");
            StepResult::Next
        })
        .push(|| {
            println!("parallel: a2");
            StepResult::Next
        });

    let branch_b = Coroutine::new(&queue, 0);
    branch_b
        .push(|| {
            println!("parallel: b1");
            StepResult::Next
        })
        .push(|| {
            println!("parallel: b2");
            StepResult::Next
        });

    let fanout = Parallel::new(&queue, 0);
    fanout
        .push(|| {
            println!("parallel: plain function");
            StepResult::Next
        })
        .push_node(&branch_a)
        .push_node(&branch_b);

    let decide = Switch::new(&queue, 0);
    decide.selector(|| {
        println!("switch: selecting");
        2
    });
    for case in 0..4 {
        decide.then(case, move || {
            println!("switch: case {case}");
            StepResult::Next
        });
    }

    let repeat = Loop::new(&queue, 0);
    repeat.with_count(3).push(|| {
        println!("loop: body");
        StepResult::Next
    });

    let done = queue.clone();
    let root = Coroutine::new(&queue, 0);
    root.push(|| {
        println!("root: begin");
        StepResult::Next
    })
    .push_node(&inner)
    .push_node(&fanout)
    .push_node(&decide)
    .push_node(&repeat)
    .push(move || {
        println!("root: done");
        done.quit();
        StepResult::End
    })
    .start();

    // Drive the queue on the main thread until the pipeline quits it.
    queue.run();
}
