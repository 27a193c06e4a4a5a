//! # Adapters
//!
//! Implementations of the outbound ports.
//!
//! - [`MemoryNetwork`] / [`MemoryHost`]: in-process transport for tests and
//!   loopback setups
//! - [`TcpTransport`]: TCP listener/dialer with a static address book
//! - `shared_bus::Subscription` as a [`BroadcastSource`](crate::ports::BroadcastSource)

pub mod bus_source;
pub mod memory;
pub mod tcp;

pub use memory::{MemoryHost, MemoryNetwork};
pub use tcp::TcpTransport;
