//! Per-session FIFO message queue with coalesced drain.
//!
//! While a turn is in progress, newly enqueued messages stay queued. When
//! the turn ends, the drainer collapses every message currently queued
//! into a single new prompt: texts joined with a blank-line separator,
//! images and files concatenated in order. `interruptAndPrompt` atomically
//! replaces the queue contents with one priority message that jumps ahead
//! of anything already queued.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use akd_domain::queue::QueuedMessage;

/// The result of coalescing every currently queued message for a session
/// into the next prompt.
pub struct CoalescedPrompt {
    pub text: String,
    pub images: Vec<String>,
    pub files: Vec<String>,
    pub dropped: usize,
}

pub struct QueueRegistry {
    queues: RwLock<HashMap<String, VecDeque<QueuedMessage>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }

    pub fn enqueue(&self, session_id: &str, text: impl Into<String>) -> QueuedMessage {
        let msg = QueuedMessage::new(session_id, text);
        self.queues
            .write()
            .entry(session_id.to_string())
            .or_default()
            .push_back(msg.clone());
        msg
    }

    pub fn enqueue_with_attachments(
        &self,
        session_id: &str,
        text: impl Into<String>,
        images: Vec<String>,
        files: Vec<String>,
    ) -> QueuedMessage {
        let msg = QueuedMessage::with_attachments(session_id, text, images, files);
        self.queues
            .write()
            .entry(session_id.to_string())
            .or_default()
            .push_back(msg.clone());
        msg
    }

    /// Jump a message ahead of anything already queued for the session,
    /// rather than appending — used by `interruptAndPrompt`'s replacement
    /// message and nowhere else.
    pub fn enqueue_priority(&self, session_id: &str, text: impl Into<String>) -> QueuedMessage {
        let mut msg = QueuedMessage::new(session_id, text);
        msg.priority = true;
        self.queues
            .write()
            .entry(session_id.to_string())
            .or_default()
            .push_front(msg.clone());
        msg
    }

    /// Remove one queued message by id. Returns `true` if it was present.
    pub fn cancel_queued(&self, session_id: &str, queue_id: &str) -> bool {
        let mut queues = self.queues.write();
        let Some(queue) = queues.get_mut(session_id) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|m| m.id != queue_id);
        queue.len() != before
    }

    pub fn len(&self, session_id: &str) -> usize {
        self.queues.read().get(session_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }

    /// Drain everything currently queued for `session_id` and coalesce it
    /// into one prompt: text joined with blank lines, images/files
    /// concatenated in queue order. Returns `None` if the queue was empty.
    pub fn drain_coalesced(&self, session_id: &str) -> Option<CoalescedPrompt> {
        let mut queues = self.queues.write();
        let queue = queues.get_mut(session_id)?;
        if queue.is_empty() {
            return None;
        }
        let messages: Vec<_> = queue.drain(..).collect();
        let text = messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let images = messages.iter().flat_map(|m| m.images.iter().cloned()).collect();
        let files = messages.iter().flat_map(|m| m.files.iter().cloned()).collect();
        Some(CoalescedPrompt {
            text,
            images,
            files,
            dropped: messages.len().saturating_sub(1),
        })
    }

    /// Atomically replace the queue's contents with a single priority
    /// message, dropping whatever was pending. Returns how many messages
    /// were dropped.
    pub fn interrupt_and_prompt(&self, session_id: &str, text: impl Into<String>) -> usize {
        let mut queues = self.queues.write();
        let queue = queues.entry(session_id.to_string()).or_default();
        let dropped = queue.len();
        queue.clear();
        let mut msg = QueuedMessage::new(session_id, text);
        msg.priority = true;
        queue.push_back(msg);
        dropped
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_multiple_queued_messages_with_blank_line() {
        let q = QueueRegistry::new();
        q.enqueue("s1", "m1");
        q.enqueue("s1", "m2");
        let coalesced = q.drain_coalesced("s1").unwrap();
        assert_eq!(coalesced.text, "m1\n\nm2");
        assert!(q.is_empty("s1"));
    }

    #[test]
    fn coalesces_images_and_files_in_order() {
        let q = QueueRegistry::new();
        q.enqueue_with_attachments("s1", "m1", vec!["img1".into()], vec!["file1".into()]);
        q.enqueue_with_attachments("s1", "m2", vec!["img2".into()], vec![]);
        let coalesced = q.drain_coalesced("s1").unwrap();
        assert_eq!(coalesced.images, vec!["img1".to_string(), "img2".to_string()]);
        assert_eq!(coalesced.files, vec!["file1".to_string()]);
    }

    #[test]
    fn drain_on_empty_queue_is_none() {
        let q = QueueRegistry::new();
        assert!(q.drain_coalesced("s1").is_none());
    }

    #[test]
    fn cancel_queued_removes_matching_message_only() {
        let q = QueueRegistry::new();
        let m1 = q.enqueue("s1", "m1");
        q.enqueue("s1", "m2");
        assert!(q.cancel_queued("s1", &m1.id));
        assert_eq!(q.len("s1"), 1);
        assert!(!q.cancel_queued("s1", "not-there"));
    }

    #[test]
    fn enqueue_priority_jumps_ahead_of_existing_queue() {
        let q = QueueRegistry::new();
        q.enqueue("s1", "first");
        q.enqueue_priority("s1", "urgent");
        let coalesced = q.drain_coalesced("s1").unwrap();
        assert_eq!(coalesced.text, "urgent\n\nfirst");
    }

    #[test]
    fn interrupt_and_prompt_replaces_queue_with_single_message() {
        let q = QueueRegistry::new();
        q.enqueue("s1", "stale1");
        q.enqueue("s1", "stale2");
        let dropped = q.interrupt_and_prompt("s1", "stop and do X");
        assert_eq!(dropped, 2);
        let coalesced = q.drain_coalesced("s1").unwrap();
        assert_eq!(coalesced.text, "stop and do X");
    }
}
