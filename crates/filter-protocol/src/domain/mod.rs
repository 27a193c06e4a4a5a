//! # Domain Module
//!
//! Core domain types for the filter protocol.

pub mod errors;
pub mod filter;
pub mod invariants;
pub mod registry;
pub mod value_objects;

pub use errors::*;
pub use filter::ContentFilter;
pub use invariants::*;
pub use registry::SubscriberRegistry;
pub use value_objects::*;

/// Content topics accepted in a single request.
pub const DEFAULT_MAX_CONTENT_TOPICS_PER_REQUEST: usize = 30;

/// Envelopes buffered per light-node subscription handle.
pub const DEFAULT_SUBSCRIPTION_BUFFER_SIZE: usize = 1024;
