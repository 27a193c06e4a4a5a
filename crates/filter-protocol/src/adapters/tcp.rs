//! # TCP Transport
//!
//! One TCP connection per stream. The dialer opens every connection with a
//! handshake frame naming the protocol, its own [`PeerId`] and its listen
//! port. Peers are resolved through an address book filled by
//! [`TcpTransport::add_peer`] and by the handshakes of inbound dialers, so a
//! full node can push back to light nodes it never configured.
//!
//! The handshake identity is not authenticated. Run behind a secured
//! channel where peers are untrusted.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use shared_types::PeerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::TransportError;
use crate::ports::{BoxedStream, StreamHandler, StreamOpener, Transport};
use crate::wire::{read_frame, write_frame, ProtocolId};

/// Upper bound for a handshake frame.
const MAX_HANDSHAKE_SIZE: usize = 256;

/// First frame on every connection.
#[derive(Debug, Serialize, Deserialize)]
struct Handshake {
    protocol: ProtocolId,
    peer: PeerId,
    listen_port: u16,
}

type HandlerMap = Arc<RwLock<HashMap<ProtocolId, Arc<dyn StreamHandler>>>>;
type AddressBook = Arc<RwLock<HashMap<PeerId, SocketAddr>>>;

/// TCP listener/dialer implementing [`Transport`].
pub struct TcpTransport {
    local_peer_id: PeerId,
    local_addr: SocketAddr,
    address_book: AddressBook,
    handlers: HandlerMap,
    connect_timeout: Duration,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    /// Default dial and handshake timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Bind `addr` and start accepting connections.
    pub async fn bind(local_peer_id: PeerId, addr: SocketAddr) -> Result<Arc<Self>, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let handlers: HandlerMap = Arc::new(RwLock::new(HashMap::new()));
        let address_book: AddressBook = Arc::new(RwLock::new(HashMap::new()));

        let transport = Arc::new(Self {
            local_peer_id,
            local_addr,
            address_book: Arc::clone(&address_book),
            handlers: Arc::clone(&handlers),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            accept_task: Mutex::new(None),
        });

        let task = tokio::spawn(accept_loop(
            listener,
            handlers,
            address_book,
            Self::DEFAULT_CONNECT_TIMEOUT,
        ));
        *transport.accept_task.lock() = Some(task);

        info!(peer = %local_peer_id, addr = %local_addr, "TCP transport listening");
        Ok(transport)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Record where `peer` can be dialed.
    pub fn add_peer(&self, peer: PeerId, addr: SocketAddr) {
        self.address_book.write().insert(peer, addr);
    }

    /// Known dial address of `peer`.
    pub fn peer_addr(&self, peer: PeerId) -> Option<SocketAddr> {
        self.address_book.read().get(&peer).copied()
    }

    /// Stop accepting connections.
    pub fn close(&self) {
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
        self.handlers.write().clear();
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    handlers: HandlerMap,
    address_book: AddressBook,
    handshake_timeout: Duration,
) {
    loop {
        match listener.accept().await {
            Ok((stream, remote_addr)) => {
                let handlers = Arc::clone(&handlers);
                let address_book = Arc::clone(&address_book);
                tokio::spawn(async move {
                    let served = serve_connection(
                        stream,
                        remote_addr,
                        handlers,
                        address_book,
                        handshake_timeout,
                    )
                    .await;
                    if let Err(e) = served {
                        debug!(remote = %remote_addr, error = %e, "Inbound connection rejected");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    remote_addr: SocketAddr,
    handlers: HandlerMap,
    address_book: AddressBook,
    handshake_timeout: Duration,
) -> Result<(), TransportError> {
    let handshake: Handshake = timeout(
        handshake_timeout,
        read_frame(&mut stream, MAX_HANDSHAKE_SIZE),
    )
    .await
    .map_err(|_| TransportError::Handshake("timed out".to_string()))?
    .map_err(|e| TransportError::Handshake(e.to_string()))?;

    let dial_back = SocketAddr::new(remote_addr.ip(), handshake.listen_port);
    if address_book.write().insert(handshake.peer, dial_back) != Some(dial_back) {
        debug!(peer = %handshake.peer, addr = %dial_back, "Learned peer address");
    }

    let handler = handlers.read().get(&handshake.protocol).cloned();
    let Some(handler) = handler else {
        return Err(TransportError::ProtocolNotSupported {
            peer: handshake.peer,
            protocol: handshake.protocol,
        });
    };

    let _ = stream.set_nodelay(true);
    handler.handle_stream(handshake.peer, Box::new(stream)).await;
    Ok(())
}

#[async_trait]
impl StreamOpener for TcpTransport {
    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: ProtocolId,
    ) -> Result<BoxedStream, TransportError> {
        let addr = self
            .address_book
            .read()
            .get(&peer)
            .copied()
            .ok_or(TransportError::Unreachable(peer))?;

        let mut stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Unreachable(peer))??;
        let _ = stream.set_nodelay(true);

        let handshake = Handshake {
            protocol,
            peer: self.local_peer_id,
            listen_port: self.local_addr.port(),
        };
        write_frame(&mut stream, &handshake)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        Ok(Box::new(stream))
    }

    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }
}

impl Transport for TcpTransport {
    fn set_handler(&self, protocol: ProtocolId, handler: Arc<dyn StreamHandler>) {
        self.handlers.write().insert(protocol, handler);
    }

    fn remove_handler(&self, protocol: ProtocolId) {
        self.handlers.write().remove(&protocol);
    }
}
