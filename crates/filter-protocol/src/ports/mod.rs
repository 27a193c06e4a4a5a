//! # Ports
//!
//! Hexagonal boundaries of the filter protocol.
//!
//! - **Inbound**: [`StreamHandler`], implemented by the services and invoked
//!   by a transport for every accepted stream.
//! - **Outbound**: [`StreamOpener`] / [`Transport`] for peer streams and
//!   [`BroadcastSource`] for relayed messages.

pub mod inbound;
pub mod outbound;

pub use inbound::StreamHandler;
pub use outbound::{BoxedStream, BroadcastSource, FilterStream, StreamOpener, Transport};
