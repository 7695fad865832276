//! Time-ordered eviction queue.
//!
//! Finished tasks are pushed here with their expiry instant. The queue is a
//! min-heap on `(expires_at, fingerprint, generation)`; [`EvictionQueue::pop_due`]
//! drains every entry whose instant has been reached.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// One pending removal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScheduledEviction {
    /// When the record becomes eligible for removal.
    pub at: DateTime<Utc>,
    /// Fingerprint of the record.
    pub fingerprint: String,
    /// Generation of the record the entry was scheduled for.
    pub generation: String,
}

/// Thread-safe min-heap of scheduled evictions.
#[derive(Debug, Default)]
pub struct EvictionQueue {
    heap: Mutex<BinaryHeap<Reverse<ScheduledEviction>>>,
}

impl EvictionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a removal.
    pub fn schedule(&self, entry: ScheduledEviction) {
        self.heap.lock().push(Reverse(entry));
    }

    /// Removes and returns every entry due at or before `now`, earliest first.
    pub fn pop_due(&self, now: DateTime<Utc>) -> Vec<ScheduledEviction> {
        let mut heap = self.heap.lock();
        let mut due = Vec::new();
        while heap.peek().is_some_and(|Reverse(next)| next.at <= now) {
            if let Some(Reverse(entry)) = heap.pop() {
                due.push(entry);
            }
        }
        due
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    /// Returns `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}
