//! # In-Memory Transport
//!
//! A hub of hosts connected by `tokio::io::duplex` pipes. Opening a stream
//! spawns the remote host's handler on the other end of a fresh pipe.
//! A closed host is unreachable.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::PeerId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::domain::TransportError;
use crate::ports::{BoxedStream, StreamHandler, StreamOpener, Transport};
use crate::wire::ProtocolId;

/// Default pipe buffer per stream (64 KiB).
pub const DEFAULT_PIPE_BUFFER: usize = 64 * 1024;

struct NetworkShared {
    hosts: RwLock<HashMap<PeerId, Arc<MemoryHost>>>,
    buffer_size: usize,
}

/// In-process network. Clones share the same hosts.
#[derive(Clone)]
pub struct MemoryNetwork {
    shared: Arc<NetworkShared>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_PIPE_BUFFER)
    }

    /// Create a network whose pipes buffer `buffer_size` bytes per direction.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            shared: Arc::new(NetworkShared {
                hosts: RwLock::new(HashMap::new()),
                buffer_size: buffer_size.max(1),
            }),
        }
    }

    /// Join a host with identity `peer_id`, replacing any previous one.
    pub fn add_host(&self, peer_id: PeerId) -> Arc<MemoryHost> {
        let host = Arc::new(MemoryHost {
            peer_id,
            network: Arc::clone(&self.shared),
            handlers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        self.shared.hosts.write().insert(peer_id, Arc::clone(&host));
        host
    }

    pub fn host(&self, peer_id: PeerId) -> Option<Arc<MemoryHost>> {
        self.shared.hosts.read().get(&peer_id).cloned()
    }

    pub fn host_count(&self) -> usize {
        self.shared.hosts.read().len()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One node on a [`MemoryNetwork`].
pub struct MemoryHost {
    peer_id: PeerId,
    network: Arc<NetworkShared>,
    handlers: RwLock<HashMap<ProtocolId, Arc<dyn StreamHandler>>>,
    closed: AtomicBool,
}

impl MemoryHost {
    /// Leave the network: new streams to or from this host fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.network.hosts.write().remove(&self.peer_id);
        self.handlers.write().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn handler(&self, protocol: ProtocolId) -> Option<Arc<dyn StreamHandler>> {
        self.handlers.read().get(&protocol).cloned()
    }
}

#[async_trait]
impl StreamOpener for MemoryHost {
    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: ProtocolId,
    ) -> Result<BoxedStream, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let remote = self
            .network
            .hosts
            .read()
            .get(&peer)
            .cloned()
            .filter(|h| !h.is_closed())
            .ok_or(TransportError::Unreachable(peer))?;
        let handler = remote
            .handler(protocol)
            .ok_or(TransportError::ProtocolNotSupported { peer, protocol })?;

        let (local, remote_end) = tokio::io::duplex(self.network.buffer_size);
        let from = self.peer_id;
        tokio::spawn(async move {
            handler.handle_stream(from, Box::new(remote_end)).await;
        });

        trace!(from = %from, to = %peer, protocol = %protocol, "Memory stream opened");
        Ok(Box::new(local))
    }

    fn local_peer_id(&self) -> PeerId {
        self.peer_id
    }
}

impl Transport for MemoryHost {
    fn set_handler(&self, protocol: ProtocolId, handler: Arc<dyn StreamHandler>) {
        self.handlers.write().insert(protocol, handler);
    }

    fn remove_handler(&self, protocol: ProtocolId) {
        self.handlers.write().remove(&protocol);
    }
}
