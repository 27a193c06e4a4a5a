//! # Role Runtimes
//!
//! [`FullRuntime`] serves the filter protocol over TCP and relays whatever
//! is published on its in-memory broadcaster. [`LightRuntime`] subscribes
//! to a service peer, keeps the subscription alive with periodic pings and
//! logs every envelope it receives.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use filter_protocol::adapters::TcpTransport;
use filter_protocol::{
    ContentFilter, DispatchStats, FilterFullNode, FilterLightNode, StreamOpener,
    SubscribeOptions,
};
use shared_bus::{InMemoryBroadcaster, MessagePublisher, TopicFilter};
use shared_types::{Envelope, Message, PeerId, SystemTimeSource, TimeSource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{NodeConfig, Role};

/// Split a relay line `content_topic payload` into its parts.
///
/// Returns `None` for blank lines. A line without a payload relays an empty
/// message.
pub fn parse_relay_line(line: &str) -> Option<(String, Vec<u8>)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (topic, payload) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some((topic.to_string(), payload.trim_start().as_bytes().to_vec()))
}

/// A full node on TCP fed by an in-memory broadcaster.
pub struct FullRuntime {
    node: FilterFullNode<TcpTransport>,
    transport: Arc<TcpTransport>,
    bus: InMemoryBroadcaster,
    pubsub_topic: String,
}

impl FullRuntime {
    pub async fn start(config: &NodeConfig) -> Result<Self> {
        let peer_id = config.peer_id.unwrap_or_else(PeerId::random);
        let transport = TcpTransport::bind(peer_id, config.listen_addr)
            .await
            .context("Failed to bind filter transport")?;

        let bus = InMemoryBroadcaster::new();
        let node = FilterFullNode::new(config.full.clone(), Arc::clone(&transport));
        node.start(bus.register(TopicFilter::topics([config.pubsub_topic.as_str()])))
            .context("Failed to start filter full node")?;

        info!(
            peer = %peer_id.to_hex(),
            addr = %transport.local_addr(),
            topic = %config.pubsub_topic,
            "Full node ready"
        );

        Ok(Self {
            node,
            transport,
            bus,
            pubsub_topic: config.pubsub_topic.clone(),
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.transport.local_peer_id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Relay one `content_topic payload` line. Returns the number of bus
    /// receivers reached, or `None` for a blank line.
    pub async fn publish_line(&self, line: &str) -> Option<usize> {
        let (content_topic, payload) = parse_relay_line(line)?;
        let envelope = Envelope::new(
            Message::new(content_topic, payload),
            SystemTimeSource::new().now_nanos(),
            self.pubsub_topic.as_str(),
        );
        Some(self.bus.publish(envelope).await)
    }

    pub fn subscriber_count(&self) -> usize {
        self.node.registry().peer_count()
    }

    pub fn stats(&self) -> DispatchStats {
        self.node.stats()
    }

    pub async fn stop(&self) {
        self.node.stop().await;
        self.transport.close();
    }
}

/// A light node on TCP logging every received envelope.
pub struct LightRuntime {
    node: Arc<FilterLightNode<TcpTransport>>,
    transport: Arc<TcpTransport>,
    receiver: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

impl LightRuntime {
    pub async fn start(config: &NodeConfig) -> Result<Self> {
        config.validate()?;

        let peer_id = config.peer_id.unwrap_or_else(PeerId::random);
        let transport = TcpTransport::bind(peer_id, config.listen_addr)
            .await
            .context("Failed to bind filter transport")?;
        for service in &config.service_peers {
            transport.add_peer(service.peer, service.addr);
        }

        let node = Arc::new(FilterLightNode::new(
            config.light.clone(),
            Arc::clone(&transport),
        ));
        node.start().context("Failed to start filter light node")?;

        let filter = ContentFilter::new(
            config.pubsub_topic.as_str(),
            config.content_topics.iter().cloned(),
        );
        let mut handle = node
            .subscribe(filter, SubscribeOptions::default())
            .await
            .context("Subscribe request failed")?;
        info!(
            peer = %peer_id.to_hex(),
            service = %handle.peer(),
            topics = ?config.content_topics,
            "Light node subscribed"
        );

        let receiver = tokio::spawn(async move {
            while let Some(envelope) = handle.recv().await {
                info!(
                    topic = %envelope.pubsub_topic(),
                    content_topic = %envelope.message().content_topic(),
                    payload = %String::from_utf8_lossy(envelope.message().payload()),
                    "Message received"
                );
            }
            debug!("Subscription closed");
        });

        let keepalive = {
            let node = Arc::clone(&node);
            tokio::spawn(async move { node.run_keepalive().await })
        };

        Ok(Self {
            node,
            transport,
            receiver,
            keepalive,
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.transport.local_peer_id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn node(&self) -> &FilterLightNode<TcpTransport> {
        &self.node
    }

    /// Unsubscribe from every service peer, then stop.
    pub async fn stop(&self) {
        if let Err(e) = self.node.unsubscribe_all(None).await {
            warn!(error = %e, "Unsubscribe on shutdown failed");
        }
        self.node.stop();
        self.keepalive.abort();
        self.receiver.abort();
        self.transport.close();
    }
}

/// Run the configured role until `shutdown` flips to `true`.
pub async fn run(config: NodeConfig, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    info!(role = %config.role, addr = %config.listen_addr, "Starting filter node");

    match config.role {
        Role::Full => {
            let runtime = FullRuntime::start(&config).await?;
            relay_stdin(&runtime, &mut shutdown).await;
            let stats = runtime.stats();
            runtime.stop().await;
            info!(
                pushes = stats.pushes_attempted,
                failed = stats.pushes_failed,
                evicted = stats.peers_evicted,
                "Full node stopped"
            );
        }
        Role::Light => {
            let runtime = LightRuntime::start(&config).await?;
            wait_for_shutdown(&mut shutdown).await;
            runtime.stop().await;
            info!("Light node stopped");
        }
    }
    Ok(())
}

/// Publish stdin lines until shutdown. After stdin closes, keep serving.
async fn relay_stdin(runtime: &FullRuntime, shutdown: &mut watch::Receiver<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = wait_for_shutdown(shutdown) => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(receivers) = runtime.publish_line(&line).await {
                        debug!(receivers, subscribers = runtime.subscriber_count(), "Relayed stdin line");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            },
        }
    }
    info!("Stdin closed, serving until shutdown");
    wait_for_shutdown(shutdown).await;
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
