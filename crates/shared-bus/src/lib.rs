//! # Shared Bus - In-Memory Relay Broadcaster
//!
//! Stands in for the relay mesh that a filter full node consumes. Relayed
//! messages are published as [`Envelope`](shared_types::Envelope)s and every
//! registered [`Subscription`] receives those whose pubsub topic it asked for.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌─────────────────────┐  register()  ┌──────────────┐
//! │  Relay mesh  │ ────────────→ │ InMemoryBroadcaster │ ───────────→ │  Full node   │
//! └──────────────┘               └─────────────────────┘              │  dispatcher  │
//!                                                                     └──────────────┘
//! ```
//!
//! A subscription that falls more than the channel capacity behind loses the
//! oldest messages; the loss is logged and consumption continues.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod publisher;
pub mod subscriber;
pub mod topics;

// Re-export main types
pub use publisher::{InMemoryBroadcaster, MessagePublisher};
pub use subscriber::{MessageStream, Subscription, SubscriptionError};
pub use topics::TopicFilter;

/// Maximum messages to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
