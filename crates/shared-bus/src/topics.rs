//! # Topic Filter
//!
//! Selects which pubsub topics a bus subscription receives.

use shared_types::Envelope;

/// Pubsub topics a subscription is registered for.
///
/// An empty filter receives every topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    /// Topics to accept (empty = all).
    pub topics: Vec<String>,
}

impl TopicFilter {
    /// Accept every pubsub topic.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: Vec::new() }
    }

    /// Accept only the listed pubsub topics.
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if an envelope's pubsub topic passes this filter.
    #[must_use]
    pub fn matches(&self, envelope: &Envelope) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == envelope.pubsub_topic())
    }

    /// Stable key used for subscription bookkeeping.
    pub(crate) fn key(&self) -> String {
        if self.topics.is_empty() {
            return "*".to_string();
        }
        let mut sorted = self.topics.clone();
        sorted.sort();
        sorted.join(",")
    }
}
