use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

// ============================================================================
// TopicHub - subscription channel keyed by topic name
// ============================================================================
//
// One broadcast channel per topic, created lazily by the first subscriber.
// Publishing never waits: a subscriber that falls more than `capacity`
// events behind sees a `Lagged` error on its receiver and skips ahead.
// A topic whose last receiver is gone is dropped on the next subscribe or
// publish, so the map only holds topics somebody is listening to.
//
// ============================================================================

pub struct TopicHub {
    capacity: usize,
    topics: RwLock<HashMap<String, broadcast::Sender<Arc<Value>>>>,
}

impl TopicHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: RwLock::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Arc<Value>> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.subscribe();
        }

        let mut topics = self.topics.write();
        topics.retain(|_, sender| sender.receiver_count() > 0);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Returns how many subscribers the payload was queued for.
    pub fn publish(&self, topic: &str, payload: Arc<Value>) -> usize {
        let delivered = match self.topics.read().get(topic) {
            Some(sender) => sender.send(payload).ok(),
            None => return 0,
        };

        match delivered {
            Some(count) => count,
            None => {
                let mut topics = self.topics.write();
                if topics.get(topic).is_some_and(|s| s.receiver_count() == 0) {
                    topics.remove(topic);
                }
                0
            }
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, |sender| sender.receiver_count())
    }

    /// Number of topics with a live sender.
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Drops every topic sender; open subscriptions end once drained.
    pub fn close(&self) {
        self.topics.write().clear();
    }
}
