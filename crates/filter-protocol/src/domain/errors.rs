//! # Domain Errors
//!
//! Error types for the filter protocol.

use shared_types::PeerId;
use thiserror::Error;

use crate::wire::{CodecError, ProtocolId, StatusCode};

/// Errors returned by filter client and node operations.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The remote full node answered with a non-200 status.
    #[error("Request failed with status {code}: {description}")]
    Status {
        /// Wire status code (400, 404, 500, 503...)
        code: u32,
        /// Status description sent by the remote
        description: String,
    },

    /// Opening or using a stream failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The exchange did not complete before the deadline.
    #[error("Request timed out")]
    Timeout,

    /// The node was stopped while the request was in flight.
    #[error("Request cancelled")]
    Cancelled,

    /// The response did not echo the request id.
    #[error("Response request id mismatch: expected {expected}, got {actual}")]
    RequestIdMismatch {
        /// Id sent in the request
        expected: String,
        /// Id found in the response
        actual: String,
    },

    /// The filter cannot be sent (empty topic, no content topics, too many).
    #[error("Invalid content filter: {0}")]
    InvalidFilter(String),

    /// No peer was given and none is configured.
    #[error("No suitable peer available")]
    NoSuitablePeer,

    /// The node is already running.
    #[error("Node already started")]
    AlreadyStarted,
}

impl FilterError {
    /// Wire status code carried by this error, if the remote sent one.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True if the remote reported it holds no subscription for us.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NotFound.as_u32())
    }
}

/// Stream transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer is not known or not reachable.
    #[error("Peer {0} unreachable")]
    Unreachable(PeerId),

    /// The peer does not serve the protocol.
    #[error("Peer {peer} does not support {protocol}")]
    ProtocolNotSupported {
        /// Remote peer
        peer: PeerId,
        /// Requested protocol
        protocol: ProtocolId,
    },

    /// Stream handshake failed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The local transport has been closed.
    #[error("Transport closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registry admission errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry already holds the maximum number of peers.
    #[error("Too many subscribed peers (max {max})")]
    TooManyPeers {
        /// Configured limit
        max: usize,
    },

    /// The peer would exceed its content topic allowance.
    #[error("Too many content topics for peer (max {max})")]
    TooManyContentTopics {
        /// Configured limit
        max: usize,
    },

    /// The filter has no content topics.
    #[error("Filter has no content topics")]
    EmptyFilter,
}

impl RegistryError {
    /// Status code reported to the subscribing peer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TooManyPeers { .. } | Self::TooManyContentTopics { .. } => {
                StatusCode::ServiceUnavailable
            }
            Self::EmptyFilter => StatusCode::BadRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = FilterError::Status {
            code: 404,
            description: "peer has no subscriptions".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request failed with status 404: peer has no subscriptions"
        );
        assert_eq!(err.status_code(), Some(404));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_non_status_errors_have_no_code() {
        assert_eq!(FilterError::Timeout.status_code(), None);
        assert!(!FilterError::Cancelled.is_not_found());
    }

    #[test]
    fn test_transport_error_converts() {
        let peer = PeerId::new([1; 32]);
        let err: FilterError = TransportError::Unreachable(peer).into();
        assert!(matches!(err, FilterError::Transport(_)));
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn test_registry_error_status() {
        assert_eq!(
            RegistryError::TooManyPeers { max: 1 }.status_code(),
            StatusCode::ServiceUnavailable
        );
        assert_eq!(RegistryError::EmptyFilter.status_code(), StatusCode::BadRequest);
    }
}
