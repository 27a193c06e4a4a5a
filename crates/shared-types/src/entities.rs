//! # Core Entities
//!
//! - [`PeerId`]: 32-byte peer identity used to key subscriptions and open streams
//! - [`Message`]: the relay message a full node forwards to subscribers
//!
//! Both types are serialized on the wire; they derive `serde` traits and
//! nothing here performs I/O.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::errors::PeerIdError;

/// A 32-byte hash (SHA-256).
pub type Hash = [u8; 32];

/// Pubsub topic a message was relayed on (e.g. `/waku/2/default-waku/proto`).
pub type PubsubTopic = String;

/// Application-level content topic carried inside a message.
pub type ContentTopic = String;

/// Unique identity of a peer in the network.
///
/// Identity is established by the transport; this crate treats it as an
/// opaque 32-byte value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Wrap raw identity bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random identity (tests and ephemeral nodes).
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw identity bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PeerId {
    /// Short form (first 8 bytes) for log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| PeerIdError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| PeerIdError::InvalidLength(v.len()))?;
        Ok(Self(bytes))
    }
}

/// A relay message.
///
/// Only [`Message::content_topic`] is interpreted by the filter protocol;
/// payload, version, timestamp and meta travel through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Message {
    /// Opaque application payload.
    pub payload: Vec<u8>,
    /// Content topic used for filter matching.
    pub content_topic: ContentTopic,
    /// Payload encoding version.
    pub version: u32,
    /// Sender timestamp in Unix nanoseconds, if set.
    pub timestamp: Option<i64>,
    /// Application metadata.
    pub meta: Option<Vec<u8>>,
    /// Ephemeral messages are not meant to be stored by relays.
    pub ephemeral: bool,
}

impl Message {
    /// Create a message with a payload and content topic.
    pub fn new(content_topic: impl Into<ContentTopic>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            content_topic: content_topic.into(),
            ..Default::default()
        }
    }

    /// Set the sender timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Content topic accessor.
    pub fn content_topic(&self) -> &str {
        &self.content_topic
    }

    /// Payload accessor.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
