//! FIFO task frontier with key deduplication.
//!
//! A key accepted once is never accepted again for the lifetime of the
//! frontier, whether its task later succeeds, fails or is retried.
//! The frontier itself is not synchronized; the engine owns it behind a
//! mutex together with its in-flight counter.

use std::collections::{HashSet, VecDeque};

use crate::task::Task;

pub struct Frontier<I> {
    pending: VecDeque<Task<I>>,
    seen: HashSet<String>,
}

impl<I> Frontier<I> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Queue a task at the tail. Returns false, leaving the frontier
    /// untouched, if the key was seen before.
    pub fn add(&mut self, task: Task<I>) -> bool {
        if self.seen.contains(task.key()) {
            return false;
        }
        self.seen.insert(task.key().to_string());
        self.pending.push_back(task);
        true
    }

    /// Remove the task at the head. `None` means "nothing right now",
    /// not "nothing ever": other workers may still be adding.
    pub fn take(&mut self) -> Option<Task<I>> {
        self.pending.pop_front()
    }

    /// Tasks not yet taken.
    pub fn size(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Distinct keys ever accepted.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn has_seen(&self, key: &str) -> bool {
        self.seen.contains(key)
    }
}

impl<I> Default for Frontier<I> {
    fn default() -> Self {
        Self::new()
    }
}
