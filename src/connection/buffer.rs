//! Per-connection message buffer: priority + TTL FIFO, drained priority-first
//! then in enqueue order within a priority.

use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct BufferedMessage {
    pub topic: String,
    pub payload: Value,
    pub priority: Priority,
    pub enqueued_at: f64,
    pub ttl: Option<f64>,
    pub retries: u32,
}

impl BufferedMessage {
    fn is_expired(&self, now: f64) -> bool {
        match self.ttl {
            Some(ttl) => now >= self.enqueued_at + ttl,
            None => false,
        }
    }
}

pub struct MessageBuffer {
    capacity: usize,
    max_retries: u32,
    critical: VecDeque<BufferedMessage>,
    high: VecDeque<BufferedMessage>,
    normal: VecDeque<BufferedMessage>,
    low: VecDeque<BufferedMessage>,
}

impl MessageBuffer {
    pub fn new(capacity: usize, max_retries: u32) -> Self {
        Self {
            capacity,
            max_retries,
            critical: VecDeque::new(),
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    fn bucket_mut(&mut self, priority: Priority) -> &mut VecDeque<BufferedMessage> {
        match priority {
            Priority::Critical => &mut self.critical,
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }

    pub fn len(&self) -> usize {
        self.critical.len() + self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn enqueue(&mut self, message: BufferedMessage) {
        if self.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "message buffer full; dropping oldest low-priority entry");
            self.low.pop_front();
        }
        self.bucket_mut(message.priority).push_back(message);
    }

    /// Drains every non-expired message, critical > high > normal > low,
    /// FIFO within a priority. Expired messages are dropped and logged.
    pub fn flush(&mut self, now: f64) -> Vec<BufferedMessage> {
        let mut out = Vec::new();
        for bucket in [
            &mut self.critical,
            &mut self.high,
            &mut self.normal,
            &mut self.low,
        ] {
            while let Some(msg) = bucket.pop_front() {
                if msg.is_expired(now) {
                    tracing::debug!(topic = %msg.topic, "buffered message expired before flush");
                    continue;
                }
                out.push(msg);
            }
        }
        out
    }

    /// Re-enqueues a message that failed to (re-)send, up to `max_retries`;
    /// beyond that it is dropped and logged.
    pub fn requeue_failed(&mut self, mut message: BufferedMessage) {
        message.retries += 1;
        if message.retries > self.max_retries {
            tracing::warn!(topic = %message.topic, retries = message.retries, "dropping message after exceeding max retries");
            return;
        }
        self.bucket_mut(message.priority).push_front(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(topic: &str, priority: Priority, enqueued_at: f64, ttl: Option<f64>) -> BufferedMessage {
        BufferedMessage {
            topic: topic.into(),
            payload: json!({}),
            priority,
            enqueued_at,
            ttl,
            retries: 0,
        }
    }

    #[test]
    fn scenario_6_buffer_ordering_and_ttl() {
        let mut buf = MessageBuffer::new(16, 3);
        buf.enqueue(msg("m1", Priority::Normal, 0.0, None));
        buf.enqueue(msg("m2", Priority::High, 0.0, None));
        buf.enqueue(msg("m3", Priority::Normal, 0.0, Some(0.010)));

        let flushed = buf.flush(0.020);
        let topics: Vec<&str> = flushed.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(topics, vec!["m2", "m1"]);
    }

    #[test]
    fn fifo_within_same_priority() {
        let mut buf = MessageBuffer::new(16, 3);
        buf.enqueue(msg("a", Priority::Normal, 0.0, None));
        buf.enqueue(msg("b", Priority::Normal, 0.0, None));
        let flushed = buf.flush(0.0);
        let topics: Vec<&str> = flushed.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(topics, vec!["a", "b"]);
    }

    #[test]
    fn requeue_drops_after_max_retries() {
        let mut buf = MessageBuffer::new(16, 1);
        let m = msg("x", Priority::Normal, 0.0, None);
        buf.requeue_failed(m.clone());
        assert_eq!(buf.len(), 1);
        let once_retried = buf.flush(0.0).remove(0);
        buf.requeue_failed(once_retried);
        assert_eq!(buf.len(), 0);
    }
}
