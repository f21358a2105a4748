//! Deadline-ordered set of pending events.
//!
//! Entries migrate into the ready FIFO once their deadline passes. Equal
//! deadlines fire in insertion order, which a per-set sequence number in
//! the key guarantees.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::event::EventRef;
use crate::fifo::PriorityFifo;

#[derive(Default)]
pub(crate) struct TimerSet {
    // (deadline, seq) forms an ordered multiset over deadlines.
    entries: BTreeMap<(Instant, u64), EventRef>,
    seq: u64,
}

impl TimerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts an event to fire at `deadline`.
    pub(crate) fn schedule(&mut self, deadline: Instant, ev: EventRef) {
        self.seq += 1;
        self.entries.insert((deadline, self.seq), ev);
    }

    /// Returns the earliest pending deadline.
    pub(crate) fn earliest(&self) -> Option<Instant> {
        self.entries.keys().next().map(|&(deadline, _)| deadline)
    }

    /// Moves every entry with `deadline <= now` into the FIFO, in
    /// ascending deadline order.
    pub(crate) fn drain_expired(&mut self, now: Instant, fifo: &mut PriorityFifo) {
        while let Some((&(deadline, _), _)) = self.entries.iter().next() {
            if deadline > now {
                break;
            }
            let (_, ev) = self.entries.pop_first().expect("peeked entry present");
            fifo.push(ev);
        }
    }

    /// Removes the first entry holding the handle. Returns false if absent.
    ///
    /// This is a linear scan by handle identity; the set is expected to
    /// stay small.
    pub(crate) fn erase(&mut self, ev: &EventRef) -> bool {
        let key = self
            .entries
            .iter()
            .find(|(_, e)| Arc::ptr_eq(e, ev))
            .map(|(&k, _)| k);
        match key {
            Some(k) => {
                self.entries.remove(&k);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
