//! # Delivered Envelope
//!
//! A [`Message`] together with the pubsub topic it was relayed on, its
//! receive timestamp and a deterministic hash. Envelopes are immutable once
//! built; subscribers receive their own clone.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entities::{Hash, Message, PubsubTopic};

/// A message as handed to a subscription listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    message: Message,
    pubsub_topic: PubsubTopic,
    received_at: i64,
    hash: Hash,
}

impl Envelope {
    /// Wrap a message received at `received_at` (Unix nanoseconds).
    pub fn new(message: Message, received_at: i64, pubsub_topic: impl Into<PubsubTopic>) -> Self {
        let pubsub_topic = pubsub_topic.into();
        let hash = message_hash(&pubsub_topic, &message);
        Self {
            message,
            pubsub_topic,
            received_at,
            hash,
        }
    }

    /// The wrapped message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Pubsub topic the message was relayed on.
    pub fn pubsub_topic(&self) -> &str {
        &self.pubsub_topic
    }

    /// Receive timestamp in Unix nanoseconds.
    pub fn received_at(&self) -> i64 {
        self.received_at
    }

    /// Deterministic message hash (independent of receive time).
    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    /// Consume the envelope, returning the message.
    pub fn into_message(self) -> Message {
        self.message
    }
}

/// SHA-256 over pubsub topic, payload, content topic and meta.
pub fn message_hash(pubsub_topic: &str, message: &Message) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(pubsub_topic.as_bytes());
    hasher.update(&message.payload);
    hasher.update(message.content_topic.as_bytes());
    if let Some(meta) = &message.meta {
        hasher.update(meta);
    }
    hasher.finalize().into()
}
