//! # Node Runtime Library
//!
//! Exposes the runtime's configuration and role wiring for testing. The main
//! entry point is the `main.rs` binary.
//!
//! - [`config`]: `FILTER_*` environment overlay on the protocol defaults
//! - [`runtime`]: full and light role runtimes over TCP

pub mod config;
pub mod runtime;

pub use config::{ConfigError, NodeConfig, Role, ServicePeer};
pub use runtime::{parse_relay_line, run, FullRuntime, LightRuntime};
