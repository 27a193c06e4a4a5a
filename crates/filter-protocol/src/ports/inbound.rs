//! # Inbound Ports
//!
//! Entry points driven by the transport.

use async_trait::async_trait;
use shared_types::PeerId;

use super::BoxedStream;

/// Handles streams a remote peer opened for one protocol.
///
/// The transport calls this once per accepted stream, on its own task.
/// `remote` is the identity established by the transport.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn handle_stream(&self, remote: PeerId, stream: BoxedStream);
}
