//! # Shared Types Crate
//!
//! Types shared by every crate of the filter workspace.
//!
//! ## Contents
//!
//! - **entities**: [`PeerId`] and the opaque relay [`Message`]
//! - **envelope**: [`Envelope`], a message as delivered to a subscriber
//! - **time**: the [`TimeSource`] port and its system-clock implementation
//! - **errors**: parsing errors for the types above
//!
//! ## Design Principles
//!
//! - **Opaque payloads**: the filter protocol only ever reads a message's
//!   content topic; everything else is carried through untouched.
//! - **Injectable time**: receive timestamps come from a [`TimeSource`] so
//!   tests can pin them.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod time;

pub use entities::*;
pub use envelope::Envelope;
pub use errors::*;
pub use time::{SystemTimeSource, TimeSource};
