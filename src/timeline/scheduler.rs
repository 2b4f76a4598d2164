//! Virtual-time timer queue.
//!
//! The host advances time explicitly; due timers are popped one by one so a firing timer can
//! schedule a follow-up that is itself due within the same advance.

use std::{cmp::Ordering, collections::BinaryHeap};

#[derive(Debug)]
struct Due<T> {
    at: f64,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Due<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Due<T> {}

impl<T> PartialOrd for Due<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Due<T> {
    // Reversed so the max-heap yields the earliest timer first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
pub struct Scheduler<T> {
    now: f64,
    seq: u64,
    queue: BinaryHeap<Due<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: 0.0,
            seq: 0,
            queue: BinaryHeap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Fire `payload` `delay` seconds from now. Negative or NaN delays fire immediately.
    pub fn schedule_in(&mut self, delay: f64, payload: T) {
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.seq += 1;
        self.queue.push(Due {
            at: self.now + delay,
            seq: self.seq,
            payload,
        });
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to its fire time.
    pub fn pop_due(&mut self, until: f64) -> Option<T> {
        if self.queue.peek().is_none_or(|d| d.at > until) {
            return None;
        }
        let due = self.queue.pop()?;
        self.now = self.now.max(due.at);
        Some(due.payload)
    }

    /// Move the clock to `until` once every due timer has been popped.
    pub fn settle_at(&mut self, until: f64) {
        self.now = self.now.max(until);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/scheduler.rs"]
mod tests;
