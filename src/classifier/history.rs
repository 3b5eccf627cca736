//! Size-bounded conversation history with FIFO eviction.

use std::collections::VecDeque;

use crate::types::ConversationEntry;

/// Ordered conversation, oldest first. Never longer than `capacity`.
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    entries: VecDeque<ConversationEntry>,
    capacity: usize,
}

impl BoundedHistory {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest ones regardless of role.
    pub fn push(&mut self, entry: ConversationEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    /// Contiguous view for request building.
    pub fn as_slice(&mut self) -> &[ConversationEntry] {
        self.entries.make_contiguous()
    }

    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_never_exceeds_capacity() {
        let mut history = BoundedHistory::new(3);
        for i in 0..10 {
            history.push(ConversationEntry::user(format!("m{i}"), vec![]));
            assert!(history.len() <= 3);
        }
        let texts: Vec<_> = history.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["m7", "m8", "m9"]);
    }

    #[test]
    fn test_evicts_oldest_regardless_of_role() {
        let mut history = BoundedHistory::new(2);
        history.push(ConversationEntry::user("q1", vec![]));
        history.push(ConversationEntry::assistant("a1"));
        history.push(ConversationEntry::user("q2", vec![]));

        let snapshot = history.snapshot();
        assert_eq!(snapshot[0].role, Role::Assistant);
        assert_eq!(snapshot[1].text, "q2");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut history = BoundedHistory::new(0);
        history.push(ConversationEntry::user("only", vec![]));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }
}
