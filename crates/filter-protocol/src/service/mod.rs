//! # Services
//!
//! - [`full_node`]: subscribe/ping server, push dispatcher and maintenance
//! - [`light_node`]: subscription client and push-receive demultiplexer

pub mod full_node;
pub mod light_node;
