//! # Subscriber Registry
//!
//! Full-node record of which peers want which content topics, plus each
//! peer's delivery health. Every operation is atomic under a
//! readers-shared / writer-exclusive lock; the raw map is never exposed.

use parking_lot::RwLock;
use shared_types::{ContentTopic, PeerId, PubsubTopic};
use std::collections::{BTreeSet, HashMap};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ContentFilter, FailureOutcome, PeerHealth, RegistryError};
use crate::config::FullNodeConfig;

/// One subscribed peer.
#[derive(Clone, Debug)]
struct SubscriberRecord {
    filters: HashMap<PubsubTopic, BTreeSet<ContentTopic>>,
    health: PeerHealth,
    last_seen: Instant,
}

impl SubscriberRecord {
    fn new(now: Instant) -> Self {
        Self {
            filters: HashMap::new(),
            health: PeerHealth::default(),
            last_seen: now,
        }
    }

    fn content_topic_count(&self) -> usize {
        self.filters.values().map(BTreeSet::len).sum()
    }

    fn matches(&self, pubsub_topic: &str, content_topic: &str) -> bool {
        self.filters
            .get(pubsub_topic)
            .is_some_and(|cts| cts.contains(content_topic))
    }
}

/// Subscriber registry.
pub struct SubscriberRegistry {
    config: FullNodeConfig,
    subscribers: RwLock<HashMap<PeerId, SubscriberRecord>>,
}

impl SubscriberRegistry {
    pub fn new(config: FullNodeConfig) -> Self {
        Self {
            config,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or merge `filter` for `peer`. Idempotent.
    ///
    /// A new peer starts healthy. Admission limits are checked before any
    /// change is made.
    pub fn add_filter(&self, peer: PeerId, filter: &ContentFilter) -> Result<(), RegistryError> {
        if filter.is_empty() {
            return Err(RegistryError::EmptyFilter);
        }

        let now = Instant::now();
        let mut subscribers = self.subscribers.write();

        let existing = subscribers.get(&peer);
        if existing.is_none() && subscribers.len() >= self.config.max_peers {
            return Err(RegistryError::TooManyPeers {
                max: self.config.max_peers,
            });
        }

        let current = existing.map_or(0, SubscriberRecord::content_topic_count);
        let added = match existing.and_then(|r| r.filters.get(filter.pubsub_topic())) {
            Some(cts) => filter
                .content_topics()
                .iter()
                .filter(|ct| !cts.contains(*ct))
                .count(),
            None => filter.len(),
        };
        if current + added > self.config.max_content_topics_per_peer {
            return Err(RegistryError::TooManyContentTopics {
                max: self.config.max_content_topics_per_peer,
            });
        }

        let record = subscribers
            .entry(peer)
            .or_insert_with(|| SubscriberRecord::new(now));
        record
            .filters
            .entry(filter.pubsub_topic().to_string())
            .or_default()
            .extend(filter.content_topics().iter().cloned());
        record.last_seen = now;

        debug!(
            peer = %peer,
            topic = %filter.pubsub_topic(),
            content_topics = record.content_topic_count(),
            "Filter added"
        );
        Ok(())
    }

    /// Remove `filter`'s content topics for `peer`. No-op if absent.
    ///
    /// The peer record is dropped once it holds no content topics.
    pub fn remove_filter(&self, peer: PeerId, filter: &ContentFilter) {
        let mut subscribers = self.subscribers.write();
        let Some(record) = subscribers.get_mut(&peer) else {
            return;
        };

        if let Some(cts) = record.filters.get_mut(filter.pubsub_topic()) {
            cts.retain(|ct| !filter.content_topics().contains(ct));
            if cts.is_empty() {
                record.filters.remove(filter.pubsub_topic());
            }
        }

        if record.filters.is_empty() {
            subscribers.remove(&peer);
            debug!(peer = %peer, "Last filter removed, peer dropped");
        }
    }

    /// Delete every subscription of `peer`. Returns whether it had any.
    pub fn remove_all(&self, peer: PeerId) -> bool {
        self.subscribers.write().remove(&peer).is_some()
    }

    /// True if `peer` holds at least one subscription.
    pub fn has(&self, peer: PeerId) -> bool {
        self.subscribers.read().contains_key(&peer)
    }

    /// True if `peer` is currently flagged as failing.
    ///
    /// An evicted peer is no longer tracked and reports `false`, unlike
    /// filter services that keep answering `true` for evicted peers. The
    /// health record goes away with the subscription, so a peer that
    /// subscribes again starts healthy.
    pub fn is_failed_peer(&self, peer: PeerId) -> bool {
        self.subscribers
            .read()
            .get(&peer)
            .is_some_and(|r| r.health.failing)
    }

    /// Refresh `peer`'s idle timer. Returns `false` if it has no subscription.
    pub fn touch(&self, peer: PeerId) -> bool {
        match self.subscribers.write().get_mut(&peer) {
            Some(record) => {
                record.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Record a failed push to `peer`, evicting it on sustained failure.
    pub fn flag_failure(&self, peer: PeerId) -> FailureOutcome {
        let now = Instant::now();
        let mut subscribers = self.subscribers.write();
        let Some(record) = subscribers.get_mut(&peer) else {
            return FailureOutcome::UnknownPeer;
        };

        let outcome = record.health.record_failure(
            now,
            self.config.failure_threshold,
            self.config.eviction_window(),
        );
        if outcome == FailureOutcome::Evicted {
            subscribers.remove(&peer);
            info!(peer = %peer, "Evicted subscriber after sustained push failures");
        }
        outcome
    }

    /// Record a successful push to `peer`. A delivery counts as activity
    /// and refreshes the idle timer.
    pub fn flag_success(&self, peer: PeerId) {
        if let Some(record) = self.subscribers.write().get_mut(&peer) {
            record.health.record_success();
            record.last_seen = Instant::now();
        }
    }

    /// Peers with a filter matching `(pubsub_topic, content_topic)`.
    pub fn matching_peers(&self, pubsub_topic: &str, content_topic: &str) -> Vec<PeerId> {
        self.subscribers
            .read()
            .iter()
            .filter(|(_, record)| record.matches(pubsub_topic, content_topic))
            .map(|(peer, _)| *peer)
            .collect()
    }

    /// Filters currently held by `peer`, sorted by pubsub topic.
    pub fn filters(&self, peer: PeerId) -> Vec<ContentFilter> {
        let subscribers = self.subscribers.read();
        let Some(record) = subscribers.get(&peer) else {
            return Vec::new();
        };
        let mut filters: Vec<_> = record
            .filters
            .iter()
            .map(|(topic, cts)| ContentFilter::new(topic.clone(), cts.iter().cloned()))
            .collect();
        filters.sort_by(|a, b| a.pubsub_topic().cmp(b.pubsub_topic()));
        filters
    }

    /// Number of subscribed peers.
    pub fn peer_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Remove peers failing for longer than the failed-peer TTL and peers
    /// idle past the idle timeout. Returns the removed peers.
    pub fn sweep(&self) -> Vec<PeerId> {
        let now = Instant::now();
        let failed_ttl = self.config.failed_peer_ttl();
        let idle_timeout = self.config.idle_subscription_timeout();

        let mut subscribers = self.subscribers.write();
        let expired: Vec<PeerId> = subscribers
            .iter()
            .filter(|(_, record)| {
                let failed_too_long = record
                    .health
                    .failing_for(now)
                    .is_some_and(|d| d >= failed_ttl);
                let idle = idle_timeout
                    .is_some_and(|t| now.saturating_duration_since(record.last_seen) >= t);
                failed_too_long || idle
            })
            .map(|(peer, _)| *peer)
            .collect();

        for peer in &expired {
            subscribers.remove(peer);
            info!(peer = %peer, "Expired subscriber removed by sweep");
        }
        expired
    }
}
