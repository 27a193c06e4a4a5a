//! # Content Filter
//!
//! A pubsub topic plus the content topics a subscriber wants from it.

use serde::{Deserialize, Serialize};
use shared_types::{ContentTopic, PubsubTopic};
use std::collections::BTreeSet;

/// `{pubsub topic, content topics}` selecting which relayed messages to forward.
///
/// Two filters are equal iff their topic and content-topic sets are equal.
/// A filter with no content topics matches nothing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFilter {
    pubsub_topic: PubsubTopic,
    content_topics: BTreeSet<ContentTopic>,
}

impl ContentFilter {
    pub fn new<I, S>(pubsub_topic: impl Into<PubsubTopic>, content_topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ContentTopic>,
    {
        Self {
            pubsub_topic: pubsub_topic.into(),
            content_topics: content_topics.into_iter().map(Into::into).collect(),
        }
    }

    /// True iff `pubsub_topic` equals this filter's topic and `content_topic`
    /// is in its set.
    pub fn matches(&self, pubsub_topic: &str, content_topic: &str) -> bool {
        self.pubsub_topic == pubsub_topic && self.content_topics.contains(content_topic)
    }

    pub fn pubsub_topic(&self) -> &str {
        &self.pubsub_topic
    }

    pub fn content_topics(&self) -> &BTreeSet<ContentTopic> {
        &self.content_topics
    }

    /// Content topics in sorted order, as carried on the wire.
    pub fn content_topics_vec(&self) -> Vec<ContentTopic> {
        self.content_topics.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.content_topics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.content_topics.len()
    }

    /// Remove the content topics of `other` (same pubsub topic only).
    ///
    /// Returns the number of content topics removed.
    pub fn remove(&mut self, other: &ContentFilter) -> usize {
        if self.pubsub_topic != other.pubsub_topic {
            return 0;
        }
        let before = self.content_topics.len();
        self.content_topics
            .retain(|ct| !other.content_topics.contains(ct));
        before - self.content_topics.len()
    }

    /// True if both filters share the pubsub topic and at least one content topic.
    pub fn overlaps(&self, other: &ContentFilter) -> bool {
        self.pubsub_topic == other.pubsub_topic
            && !self.content_topics.is_disjoint(&other.content_topics)
    }
}
