//! # Outbound Ports
//!
//! Traits for external dependencies (peer streams, relayed messages).

use async_trait::async_trait;
use shared_types::{Envelope, PeerId};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use super::StreamHandler;
use crate::domain::TransportError;
use crate::wire::ProtocolId;

/// A bidirectional byte stream to a peer.
pub trait FilterStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> FilterStream for T {}

/// Owned, type-erased stream.
pub type BoxedStream = Box<dyn FilterStream>;

/// Resolves a peer identity to a fresh stream for a protocol.
#[async_trait]
pub trait StreamOpener: Send + Sync {
    /// Open a new stream to `peer` speaking `protocol`.
    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: ProtocolId,
    ) -> Result<BoxedStream, TransportError>;

    /// Identity of the local node.
    fn local_peer_id(&self) -> PeerId;
}

/// A stream opener that also accepts inbound streams.
pub trait Transport: StreamOpener {
    /// Route inbound streams for `protocol` to `handler`, replacing any
    /// previous handler.
    fn set_handler(&self, protocol: ProtocolId, handler: Arc<dyn StreamHandler>);

    /// Stop accepting streams for `protocol`.
    fn remove_handler(&self, protocol: ProtocolId);
}

/// Source of relayed `(pubsub topic, message)` pairs for the dispatcher.
#[async_trait]
pub trait BroadcastSource: Send {
    /// Next relayed message, or `None` once the source is closed.
    ///
    /// Must be cancel-safe: dropping the future loses no message.
    async fn next_message(&mut self) -> Option<Envelope>;
}

#[async_trait]
impl BroadcastSource for mpsc::Receiver<Envelope> {
    async fn next_message(&mut self) -> Option<Envelope> {
        self.recv().await
    }
}
