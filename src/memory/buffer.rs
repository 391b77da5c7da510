//! Short-term buffer — bounded, per-conversation FIFO window of recent turns.
//!
//! Pure in-process state: never persisted, rebuilt empty on restart. The
//! buffer is owned by the [`MemoryManager`](super::MemoryManager) instance
//! and accessed from a single control flow, so there is no interior locking.

use std::collections::{HashMap, VecDeque};

use crate::llm::ChatMessage;

/// Per-conversation bounded window of the most recent turns.
///
/// Invariant: after any sequence of appends, a conversation's window holds
/// exactly `min(appended, capacity)` entries — the most recent ones, in
/// insertion order. Eviction is strictly oldest-first.
#[derive(Debug)]
pub struct ShortTermBuffer {
    capacity: usize,
    windows: HashMap<String, VecDeque<ChatMessage>>,
}

impl ShortTermBuffer {
    /// Create a buffer with a fixed capacity (counted in turns, not tokens).
    pub fn new(capacity: usize) -> Self {
        Self { capacity, windows: HashMap::new() }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Guarantee an (initially empty) window exists for the conversation.
    /// Idempotent.
    pub fn ensure(&mut self, conversation_id: &str) {
        if !self.windows.contains_key(conversation_id) {
            self.windows.insert(conversation_id.to_string(), VecDeque::new());
        }
    }

    /// Append a turn to the tail, evicting from the head while over capacity.
    /// O(1) amortised; never reorders surviving entries.
    pub fn append(&mut self, conversation_id: &str, message: ChatMessage) {
        let window = self.windows.entry(conversation_id.to_string()).or_default();
        window.push_back(message);
        while window.len() > self.capacity {
            window.pop_front();
        }
    }

    /// Snapshot of the current window, oldest first. Does not mutate.
    pub fn read(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.windows
            .get(conversation_id)
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace the window with an empty one.
    pub fn clear(&mut self, conversation_id: &str) {
        self.windows.insert(conversation_id.to_string(), VecDeque::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn user(content: &str) -> ChatMessage {
        ChatMessage::new(Role::User, content)
    }

    #[test]
    fn ensure_is_idempotent_and_empty() {
        let mut buf = ShortTermBuffer::new(4);
        buf.ensure("c1");
        buf.ensure("c1");
        assert!(buf.read("c1").is_empty());
    }

    #[test]
    fn read_unknown_conversation_is_empty() {
        let buf = ShortTermBuffer::new(4);
        assert!(buf.read("nope").is_empty());
    }

    #[test]
    fn capacity_two_keeps_last_two() {
        let mut buf = ShortTermBuffer::new(2);
        buf.append("c1", user("A"));
        buf.append("c1", user("B"));
        buf.append("c1", user("C"));
        let window = buf.read("c1");
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "B");
        assert_eq!(window[1].content, "C");
    }

    #[test]
    fn holds_min_of_appended_and_capacity() {
        for cap in 1..=5 {
            let mut buf = ShortTermBuffer::new(cap);
            for i in 0..8 {
                buf.append("c1", user(&format!("m{i}")));
                let window = buf.read("c1");
                assert_eq!(window.len(), (i + 1).min(cap));
                // Window is always the most recent entries, in order.
                let first_kept = (i + 1).saturating_sub(cap);
                for (offset, m) in window.iter().enumerate() {
                    assert_eq!(m.content, format!("m{}", first_kept + offset));
                }
            }
        }
    }

    #[test]
    fn conversations_are_isolated() {
        let mut buf = ShortTermBuffer::new(2);
        buf.append("c1", user("one"));
        buf.append("c2", user("two"));
        assert_eq!(buf.read("c1").len(), 1);
        assert_eq!(buf.read("c2").len(), 1);
        assert_eq!(buf.read("c2")[0].content, "two");
    }

    #[test]
    fn clear_empties_regardless_of_prior_state() {
        let mut buf = ShortTermBuffer::new(3);
        assert!(buf.read("c1").is_empty());
        buf.clear("c1");
        assert!(buf.read("c1").is_empty());

        for i in 0..5 {
            buf.append("c1", user(&format!("m{i}")));
        }
        buf.clear("c1");
        assert!(buf.read("c1").is_empty());

        // Still usable after clear.
        buf.append("c1", user("again"));
        assert_eq!(buf.read("c1").len(), 1);
    }
}
