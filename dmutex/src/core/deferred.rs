//! Peers whose REPLY is owed once the critical section is vacated.

use std::collections::VecDeque;

use super::types::ProcessId;

/// FIFO of deferred peers. Appending a peer that is already queued is a
/// no-op, so a duplicated REQUEST never produces a second REPLY.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct DeferredQueue {
    queue: VecDeque<ProcessId>,
}

impl DeferredQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `id` was already queued.
    pub fn append(&mut self, id: ProcessId) -> bool {
        if self.queue.contains(&id) {
            return false;
        }
        self.queue.push_back(id);
        true
    }

    /// Remove every queued peer, oldest first.
    pub fn drain_all(&mut self) -> Vec<ProcessId> {
        self.queue.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.queue.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_fifo_order() {
        let mut queue = DeferredQueue::new();
        queue.append(ProcessId(3));
        queue.append(ProcessId(1));
        queue.append(ProcessId(2));
        assert_eq!(
            queue.drain_all(),
            vec![ProcessId(3), ProcessId(1), ProcessId(2)]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicate_append_ignored() {
        let mut queue = DeferredQueue::new();
        assert!(queue.append(ProcessId(2)));
        assert!(!queue.append(ProcessId(2)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_empty() {
        let mut queue = DeferredQueue::new();
        assert!(queue.drain_all().is_empty());
    }
}
