//! FIFO queue of blocked waiters.
//!
//! Every blocking primitive keeps its sleepers in one of these. Entries are
//! owned by the queue while enqueued; the waiter keeps its own reference so
//! the record outlives any dequeue.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct WaitQueue<T> {
    entries: VecDeque<T>,
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WaitQueue<T> {
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append behind every entry already queued.
    pub fn insert_tail(&mut self, entry: T) {
        self.entries.push_back(entry);
    }

    /// Remove the oldest entry, or `None` if the queue is empty.
    pub fn remove_head(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    /// Remove the oldest entry only if `pred` accepts it.
    pub fn remove_head_if(&mut self, pred: impl FnOnce(&T) -> bool) -> Option<T> {
        if pred(self.entries.front()?) {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn head(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Empty the queue, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..)
    }
}
