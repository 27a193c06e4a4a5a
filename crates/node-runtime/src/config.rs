//! # Node Configuration
//!
//! Runtime configuration for either node role, overlaid from `FILTER_*`
//! environment variables.
//!
//! | Variable                 | Meaning                                         |
//! |--------------------------|-------------------------------------------------|
//! | `FILTER_ROLE`            | `full` or `light` (default `full`)              |
//! | `FILTER_LISTEN_ADDR`     | TCP listen address (default `0.0.0.0:60000`)    |
//! | `FILTER_PEER_ID`         | 64 hex chars; random when unset                 |
//! | `FILTER_SERVICE_PEER`    | comma-separated `<peer hex>@<host:port>` list   |
//! | `FILTER_PUBSUB_TOPIC`    | pubsub topic (default `/waku/2/default-waku/proto`) |
//! | `FILTER_CONTENT_TOPICS`  | comma-separated content topics (light role)     |
//! | `FILTER_PUSH_TIMEOUT_MS` | per-peer push timeout (full role)               |
//! | `FILTER_KEEPALIVE_MS`    | keepalive ping interval, 0 disables (light role) |

use filter_protocol::{FullNodeConfig, LightNodeConfig};
use shared_types::PeerId;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

/// Pubsub topic used when none is configured.
pub const DEFAULT_PUBSUB_TOPIC: &str = "/waku/2/default-waku/proto";

/// Listen address used when none is configured.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:60000";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown role '{0}', expected 'full' or 'light'")]
    InvalidRole(String),

    #[error("{var}: invalid value '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("service peer '{0}' must look like <peer hex>@<host:port>")]
    InvalidServicePeer(String),

    #[error("light role requires FILTER_SERVICE_PEER")]
    MissingServicePeer,

    #[error("light role requires FILTER_CONTENT_TOPICS")]
    MissingContentTopics,
}

/// Which side of the protocol this process runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    Full,
    Light,
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Role::Full),
            "light" => Ok(Role::Light),
            other => Err(ConfigError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Full => write!(f, "full"),
            Role::Light => write!(f, "light"),
        }
    }
}

/// A full node the light role may talk to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServicePeer {
    pub peer: PeerId,
    pub addr: SocketAddr,
}

impl FromStr for ServicePeer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidServicePeer(s.to_string());
        let (peer, addr) = s.trim().split_once('@').ok_or_else(invalid)?;
        Ok(Self {
            peer: peer.parse().map_err(|_| invalid())?,
            addr: addr.parse().map_err(|_| invalid())?,
        })
    }
}

/// Complete node configuration.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub role: Role,
    pub listen_addr: SocketAddr,
    /// Identity; a random one is generated when `None`.
    pub peer_id: Option<PeerId>,
    pub service_peers: Vec<ServicePeer>,
    pub pubsub_topic: String,
    pub content_topics: Vec<String>,
    pub full: FullNodeConfig,
    pub light: LightNodeConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: Role::default(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 60000)),
            peer_id: None,
            service_peers: Vec::new(),
            pubsub_topic: DEFAULT_PUBSUB_TOPIC.to_string(),
            content_topics: Vec::new(),
            full: FullNodeConfig::default(),
            light: LightNodeConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(role) = lookup("FILTER_ROLE") {
            config.role = role.parse()?;
        }
        if let Some(addr) = lookup("FILTER_LISTEN_ADDR") {
            config.listen_addr = parse_var("FILTER_LISTEN_ADDR", &addr)?;
        }
        if let Some(peer) = lookup("FILTER_PEER_ID") {
            config.peer_id = Some(parse_var("FILTER_PEER_ID", &peer)?);
        }
        if let Some(peers) = lookup("FILTER_SERVICE_PEER") {
            config.service_peers = split_list(&peers)
                .map(str::parse)
                .collect::<Result<_, _>>()?;
        }
        if let Some(topic) = lookup("FILTER_PUBSUB_TOPIC") {
            config.pubsub_topic = topic.trim().to_string();
        }
        if let Some(topics) = lookup("FILTER_CONTENT_TOPICS") {
            config.content_topics = split_list(&topics).map(str::to_string).collect();
        }
        if let Some(ms) = lookup("FILTER_PUSH_TIMEOUT_MS") {
            config.full.push_timeout_ms = parse_var("FILTER_PUSH_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("FILTER_KEEPALIVE_MS") {
            config.light.keepalive_interval_ms = parse_var("FILTER_KEEPALIVE_MS", &ms)?;
        }

        config.light.service_peers = config.service_peers.iter().map(|s| s.peer).collect();
        Ok(config)
    }

    /// Check the settings the selected role depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.role == Role::Light {
            if self.service_peers.is_empty() {
                return Err(ConfigError::MissingServicePeer);
            }
            if self.content_topics.is_empty() {
                return Err(ConfigError::MissingContentTopics);
            }
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
