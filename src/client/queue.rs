//! Outbound message queue used while the session is offline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Bounded FIFO buffer for protocol messages awaiting a live connection.
///
/// When the queue is full the incoming message is the one dropped, so the
/// earliest-enqueued messages always survive an outage intact.
pub struct OutboundQueue {
    buffer: VecDeque<Value>,
    /// Maximum number of buffered messages
    capacity: usize,
    /// Stats: messages accepted
    enqueued_count: u64,
    /// Stats: messages handed back for transmission
    dequeued_count: u64,
    /// Stats: messages dropped on overflow
    dropped_count: u64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            enqueued_count: 0,
            dequeued_count: 0,
            dropped_count: 0,
        }
    }

    /// Buffer a message for later transmission.
    ///
    /// Returns `false` when the queue is already full and the message was
    /// dropped. The drop is counted and visible through [`Self::stats`].
    pub fn enqueue(&mut self, message: Value) -> bool {
        if self.buffer.len() >= self.capacity {
            self.dropped_count += 1;
            warn!(
                capacity = self.capacity,
                dropped_total = self.dropped_count,
                "Outbound queue full, dropping newest message"
            );
            return false;
        }

        self.buffer.push_back(message);
        self.enqueued_count += 1;
        debug!(queued = self.buffer.len(), "Buffered outbound message");
        true
    }

    /// Put a message back at the front after a failed transmission.
    ///
    /// The message already passed admission once, so it is re-admitted even
    /// at capacity; if that overflows the buffer the newest message at the
    /// back is dropped to keep the bound.
    pub fn requeue_front(&mut self, message: Value) {
        self.buffer.push_front(message);
        if self.buffer.len() > self.capacity {
            self.buffer.pop_back();
            self.dropped_count += 1;
            warn!(
                capacity = self.capacity,
                "Outbound queue overflow on requeue, dropping newest message"
            );
        }
    }

    /// Take the next message to transmit
    pub fn dequeue(&mut self) -> Option<Value> {
        let message = self.buffer.pop_front();
        if message.is_some() {
            self.dequeued_count += 1;
        }
        message
    }

    /// Look at the next message without removing it
    pub fn peek(&self) -> Option<&Value> {
        self.buffer.front()
    }

    /// Iterate buffered messages in transmission order
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total messages dropped on overflow so far
    pub fn dropped_total(&self) -> u64 {
        self.dropped_count
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            current_size: self.buffer.len(),
            capacity: self.capacity,
            enqueued_total: self.enqueued_count,
            dequeued_total: self.dequeued_count,
            dropped_total: self.dropped_count,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub current_size: usize,
    pub capacity: usize,
    pub enqueued_total: u64,
    pub dequeued_total: u64,
    pub dropped_total: u64,
}

impl std::fmt::Display for QueueStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Queue[{}/{}, enq={}, deq={}, drop={}]",
            self.current_size,
            self.capacity,
            self.enqueued_total,
            self.dequeued_total,
            self.dropped_total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(n: u64) -> Value {
        json!({"type": "fingerprint_data", "seq": n})
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = OutboundQueue::new(10);

        assert!(queue.enqueue(message(1)));
        assert!(queue.enqueue(message(2)));
        assert!(queue.enqueue(message(3)));

        assert_eq!(queue.dequeue().unwrap()["seq"], 1);
        assert_eq!(queue.dequeue().unwrap()["seq"], 2);
        assert_eq!(queue.dequeue().unwrap()["seq"], 3);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_overflow_drops_newest() {
        let mut queue = OutboundQueue::new(3);

        assert!(queue.enqueue(message(1)));
        assert!(queue.enqueue(message(2)));
        assert!(queue.enqueue(message(3)));

        // Full: the incoming message is the one dropped
        assert!(!queue.enqueue(message(4)));
        assert!(!queue.enqueue(message(5)));

        let kept: Vec<u64> = queue.iter().map(|m| m["seq"].as_u64().unwrap()).collect();
        assert_eq!(kept, vec![1, 2, 3]);
        assert_eq!(queue.dropped_total(), 2);
    }

    #[test]
    fn test_requeue_front_preserves_order() {
        let mut queue = OutboundQueue::new(10);
        queue.enqueue(message(2));
        queue.enqueue(message(3));

        // A failed send puts the in-flight message back at the head
        queue.requeue_front(message(1));

        assert_eq!(queue.dequeue().unwrap()["seq"], 1);
        assert_eq!(queue.dequeue().unwrap()["seq"], 2);
        assert_eq!(queue.dequeue().unwrap()["seq"], 3);
    }

    #[test]
    fn test_requeue_front_at_capacity_drops_back() {
        let mut queue = OutboundQueue::new(2);
        queue.enqueue(message(2));
        queue.enqueue(message(3));

        queue.requeue_front(message(1));

        let kept: Vec<u64> = queue.iter().map(|m| m["seq"].as_u64().unwrap()).collect();
        assert_eq!(kept, vec![1, 2]);
        assert_eq!(queue.dropped_total(), 1);
    }

    #[test]
    fn test_stats() {
        let mut queue = OutboundQueue::new(2);
        queue.enqueue(message(1));
        queue.enqueue(message(2));
        queue.enqueue(message(3));
        queue.dequeue();

        let stats = queue.stats();
        assert_eq!(stats.current_size, 1);
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.enqueued_total, 2);
        assert_eq!(stats.dequeued_total, 1);
        assert_eq!(stats.dropped_total, 1);
        assert_eq!(stats.to_string(), "Queue[1/2, enq=2, deq=1, drop=1]");
    }
}
