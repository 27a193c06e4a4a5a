//! # Error Types
//!
//! Parsing errors for shared entities.

use thiserror::Error;

/// Errors parsing a [`PeerId`](crate::PeerId) from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerIdError {
    /// Input is not valid hex.
    #[error("Invalid peer id hex: {0}")]
    InvalidHex(String),

    /// Input decoded to the wrong number of bytes.
    #[error("Invalid peer id length: {0} bytes (expected 32)")]
    InvalidLength(usize),
}
