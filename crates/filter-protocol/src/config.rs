//! # Filter Configuration
//!
//! Configuration for the full-node and light-node sides of the protocol.

use serde::{Deserialize, Serialize};
use shared_types::PeerId;
use std::time::Duration;

use crate::domain::{DEFAULT_MAX_CONTENT_TOPICS_PER_REQUEST, DEFAULT_SUBSCRIPTION_BUFFER_SIZE};
use crate::wire::DEFAULT_MAX_FRAME_SIZE;

/// Full node (filter service) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FullNodeConfig {
    /// Per-peer push delivery timeout in milliseconds.
    pub push_timeout_ms: u64,

    /// Maximum number of subscribed peers.
    pub max_peers: usize,

    /// Maximum content topics one peer may hold across all pubsub topics.
    pub max_content_topics_per_peer: usize,

    /// Maximum content topics in a single subscribe/unsubscribe request.
    pub max_content_topics_per_request: usize,

    /// Consecutive failures before a peer is marked failing.
    pub failure_threshold: u32,

    /// A failing peer that fails again this long after its first failure is evicted.
    pub eviction_window_ms: u64,

    /// The maintenance sweep evicts peers failing for longer than this.
    pub failed_peer_ttl_secs: u64,

    /// Subscriptions not refreshed by subscribe, ping or a delivered push within this time expire (0 = never).
    pub idle_subscription_timeout_secs: u64,

    /// Maintenance sweep interval in milliseconds.
    pub maintenance_interval_ms: u64,

    /// Timeout for reading one subscribe request in milliseconds.
    pub request_read_timeout_ms: u64,

    /// How long shutdown waits for in-flight pushes in milliseconds.
    pub drain_timeout_ms: u64,

    /// Maximum accepted frame size in bytes.
    pub max_frame_size: usize,
}

impl Default for FullNodeConfig {
    fn default() -> Self {
        Self {
            push_timeout_ms: 5_000,
            max_peers: 1000,
            max_content_topics_per_peer: 1000,
            max_content_topics_per_request: DEFAULT_MAX_CONTENT_TOPICS_PER_REQUEST,
            failure_threshold: 1,
            eviction_window_ms: 5_000,
            failed_peer_ttl_secs: 60,
            idle_subscription_timeout_secs: 300,
            maintenance_interval_ms: 10_000,
            request_read_timeout_ms: 5_000,
            drain_timeout_ms: 2_000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl FullNodeConfig {
    /// Create a config for testing (short timers).
    pub fn for_testing() -> Self {
        Self {
            push_timeout_ms: 1_000,
            max_peers: 16,
            max_content_topics_per_peer: 64,
            eviction_window_ms: 200,
            failed_peer_ttl_secs: 2,
            idle_subscription_timeout_secs: 0,
            maintenance_interval_ms: 100,
            request_read_timeout_ms: 1_000,
            drain_timeout_ms: 500,
            ..Self::default()
        }
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    pub fn eviction_window(&self) -> Duration {
        Duration::from_millis(self.eviction_window_ms)
    }

    pub fn failed_peer_ttl(&self) -> Duration {
        Duration::from_secs(self.failed_peer_ttl_secs)
    }

    /// `None` when idle expiry is disabled.
    pub fn idle_subscription_timeout(&self) -> Option<Duration> {
        (self.idle_subscription_timeout_secs > 0)
            .then(|| Duration::from_secs(self.idle_subscription_timeout_secs))
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms.max(1))
    }

    pub fn request_read_timeout(&self) -> Duration {
        Duration::from_millis(self.request_read_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Light node (filter client) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightNodeConfig {
    /// Deadline for one subscribe/unsubscribe/ping exchange in milliseconds.
    pub request_timeout_ms: u64,

    /// Envelopes buffered per subscription handle before the oldest are dropped.
    pub subscription_buffer_size: usize,

    /// Maximum content topics in a single request.
    pub max_content_topics_per_request: usize,

    /// Timeout for reading one inbound push in milliseconds.
    pub push_read_timeout_ms: u64,

    /// Maximum accepted frame size in bytes.
    pub max_frame_size: usize,

    /// Full nodes to pick from when a call names no peer.
    pub service_peers: Vec<PeerId>,

    /// Interval between keepalive pings to serving peers in milliseconds
    /// (0 = no keepalive). Keep it below the full node's idle timeout.
    pub keepalive_interval_ms: u64,
}

impl Default for LightNodeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            subscription_buffer_size: DEFAULT_SUBSCRIPTION_BUFFER_SIZE,
            max_content_topics_per_request: DEFAULT_MAX_CONTENT_TOPICS_PER_REQUEST,
            push_read_timeout_ms: 5_000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            service_peers: Vec::new(),
            keepalive_interval_ms: 60_000,
        }
    }
}

impl LightNodeConfig {
    /// Create a config for testing (short timers, small buffers).
    pub fn for_testing() -> Self {
        Self {
            request_timeout_ms: 2_000,
            subscription_buffer_size: 16,
            push_read_timeout_ms: 1_000,
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn push_read_timeout(&self) -> Duration {
        Duration::from_millis(self.push_read_timeout_ms)
    }

    /// `None` when keepalives are disabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_ms > 0).then(|| Duration::from_millis(self.keepalive_interval_ms))
    }
}
