//! # Content Filter Protocol
//!
//! Light nodes that cannot run the relay mesh delegate delivery to full nodes,
//! which forward only the messages matching a client-chosen
//! [`ContentFilter`] (pubsub topic + set of content topics).
//!
//! ## Architecture Role
//!
//! ```text
//!                     FULL NODE                                   LIGHT NODE
//! [Relay mesh] ──→ PushDispatcher ──filter-push──────────────→ PushReceiver ──→ SubscriptionHandle
//!                       │  ↑                                        ↑
//!                       ↓  │ matching_peers / flag_*                │ dispatch
//!                  SubscriberRegistry ←── FilterSubscribeServer ←──filter-subscribe── FilterLightNode
//! ```
//!
//! ## Modules
//!
//! - [`domain`]: content filters, the subscriber registry and peer health
//! - [`wire`]: protocol ids, request/response/push messages, frame codec
//! - [`ports`]: stream transport, inbound stream handler, broadcast source
//! - [`service`]: full-node server + dispatcher, light-node client + demultiplexer
//! - [`adapters`]: in-memory and TCP transports, bus broadcast source
//!
//! ## Delivery guarantees
//!
//! - A subscribed light node receives every matching message relayed while
//!   its subscription is registered, unless its per-handle buffer overflows
//!   (oldest messages are dropped first).
//! - No ordering guarantee across distinct peers; no deduplication.
//! - Unreachable subscribers are evicted without manual intervention.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;
pub mod wire;

pub use config::{FullNodeConfig, LightNodeConfig};
pub use domain::{
    ContentFilter, DispatchStats, FailureOutcome, FilterError, RegistryError, SubscriberRegistry,
};
pub use ports::{BoxedStream, BroadcastSource, StreamHandler, StreamOpener, Transport};
pub use service::full_node::{FilterFullNode, FilterSubscribeServer, PushDispatcher};
pub use service::light_node::{
    FilterLightNode, PushReceiver, SubscribeOptions, SubscriptionDetails, SubscriptionHandle,
};
pub use wire::{
    CodecError, FilterSubscribeRequest, FilterSubscribeResponse, FilterSubscribeType,
    MessagePush, ProtocolId, StatusCode,
};
