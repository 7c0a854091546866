//! Pending webhook deliveries
//!
//! Unbounded FIFO shared between every producer and the delivery loop.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Thread-safe FIFO of lines waiting to be posted
#[derive(Debug, Default)]
pub struct WebhookQueue {
    pending: Mutex<VecDeque<String>>,
}

impl WebhookQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line to the tail
    pub fn push(&self, line: String) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(line);
        }
    }

    /// Remove the oldest line
    pub fn pop(&self) -> Option<String> {
        self.pending.lock().ok().and_then(|mut p| p.pop_front())
    }

    /// Put a line that failed delivery back at the tail.
    ///
    /// Order is not preserved across failures; the line is never dropped.
    pub fn requeue(&self, line: String) {
        self.push(line);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the pending lines, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.pending
            .lock()
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = WebhookQueue::new();
        queue.push("m1".to_string());
        queue.push("m2".to_string());

        assert_eq!(queue.pop().as_deref(), Some("m1"));
        assert_eq!(queue.pop().as_deref(), Some("m2"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_requeue_goes_to_tail() {
        let queue = WebhookQueue::new();
        for m in ["m1", "m2", "m3"] {
            queue.push(m.to_string());
        }

        let head = queue.pop().unwrap();
        queue.requeue(head);

        assert_eq!(queue.snapshot(), vec!["m2", "m3", "m1"]);
        assert_eq!(queue.len(), 3);
    }
}
