//! # Message Publisher
//!
//! Defines the publishing side of the broadcaster.

use crate::subscriber::{MessageStream, Subscription};
use crate::topics::TopicFilter;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::Envelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait for publishing relayed messages to the bus.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish an envelope to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the envelope.
    async fn publish(&self, envelope: Envelope) -> usize;

    /// Get the total number of envelopes published.
    fn messages_published(&self) -> u64;
}

/// In-memory broadcaster.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
pub struct InMemoryBroadcaster {
    /// Broadcast sender for envelopes.
    sender: broadcast::Sender<Envelope>,

    /// Active registration count by topic key.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total envelopes published.
    messages_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryBroadcaster {
    /// Create a broadcaster with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broadcaster with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Register for envelopes on the filtered pubsub topics.
    #[must_use]
    pub fn register(&self, filter: TopicFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = filter.key();

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }

        debug!(topics = %topic_key, "New bus subscription");

        Subscription::new(receiver, filter, Arc::clone(&self.subscriptions), topic_key)
    }

    /// Register and return a [`MessageStream`].
    #[must_use]
    pub fn message_stream(&self, filter: TopicFilter) -> MessageStream {
        self.register(filter).into_stream()
    }

    /// Number of live broadcast receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of tracked registrations across all topic keys.
    #[must_use]
    pub fn registrations(&self) -> usize {
        self.subscriptions
            .read()
            .map(|subs| subs.values().sum())
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroadcaster {
    async fn publish(&self, envelope: Envelope) -> usize {
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let topic = envelope.pubsub_topic().to_string();
        let content_topic = envelope.message().content_topic().to_string();

        match self.sender.send(envelope) {
            Ok(receivers) => {
                trace!(
                    topic = %topic,
                    content_topic = %content_topic,
                    receivers,
                    "Message published"
                );
                receivers
            }
            Err(_) => {
                debug!(topic = %topic, "Message dropped (no receivers)");
                0
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Message;

    fn envelope() -> Envelope {
        Envelope::new(Message::new("ct", vec![1]), 0, "/t")
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryBroadcaster::new();
        assert_eq!(bus.publish(envelope()).await, 0);
        assert_eq!(bus.messages_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_with_subscribers() {
        let bus = InMemoryBroadcaster::new();
        let _a = bus.register(TopicFilter::all());
        let _b = bus.register(TopicFilter::topics(["/other"]));

        // Receiver count is independent of the topic filter.
        assert_eq!(bus.publish(envelope()).await, 2);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_default_broadcaster() {
        let bus = InMemoryBroadcaster::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.messages_published(), 0);
    }
}
