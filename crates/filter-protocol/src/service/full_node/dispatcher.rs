//! # Push Dispatcher
//!
//! Consumes relayed messages and pushes each one to every peer whose filter
//! matches. Every (message, peer) delivery runs on its own task with its own
//! timeout, so one stalled peer delays neither other peers nor the next
//! message.

use shared_types::{Envelope, PeerId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::FullNodeConfig;
use crate::domain::{DispatchStats, FailureOutcome, FilterError, SubscriberRegistry};
use crate::ports::{BroadcastSource, StreamOpener};
use crate::wire::{write_frame, MessagePush, ProtocolId};

/// Atomic dispatcher counters.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    messages_consumed: AtomicU64,
    pushes_attempted: AtomicU64,
    pushes_succeeded: AtomicU64,
    pushes_failed: AtomicU64,
    peers_evicted: AtomicU64,
}

impl DispatchMetrics {
    pub fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            messages_consumed: self.messages_consumed.load(Ordering::Relaxed),
            pushes_attempted: self.pushes_attempted.load(Ordering::Relaxed),
            pushes_succeeded: self.pushes_succeeded.load(Ordering::Relaxed),
            pushes_failed: self.pushes_failed.load(Ordering::Relaxed),
            peers_evicted: self.peers_evicted.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.peers_evicted
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Forwards matching messages from a [`BroadcastSource`] to subscribers.
pub struct PushDispatcher {
    config: FullNodeConfig,
    registry: Arc<SubscriberRegistry>,
    opener: Arc<dyn StreamOpener>,
    metrics: Arc<DispatchMetrics>,
}

impl PushDispatcher {
    pub fn new(
        config: FullNodeConfig,
        registry: Arc<SubscriberRegistry>,
        opener: Arc<dyn StreamOpener>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            config,
            registry,
            opener,
            metrics,
        }
    }

    /// Consume `source` until it closes or `shutdown` flips to `true`, then
    /// drain in-flight pushes for up to the drain timeout and abort the rest.
    pub async fn run<S: BroadcastSource>(&self, mut source: S, mut shutdown: watch::Receiver<bool>) {
        let mut in_flight = JoinSet::new();
        info!("Push dispatcher started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = source.next_message() => match next {
                    Some(envelope) => self.dispatch(envelope, &mut in_flight),
                    None => {
                        debug!("Broadcast source closed");
                        break;
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!(error = %e, "Push task panicked");
                        }
                    }
                }
            }
        }

        let remaining = in_flight.len();
        let drained = timeout(self.config.drain_timeout(), async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(remaining = in_flight.len(), "Aborting undrained pushes");
            in_flight.abort_all();
            while in_flight.join_next().await.is_some() {}
        }

        info!(drained = remaining, "Push dispatcher stopped");
    }

    /// Start one push task per matching peer.
    fn dispatch(&self, envelope: Envelope, in_flight: &mut JoinSet<()>) {
        self.metrics.messages_consumed.fetch_add(1, Ordering::Relaxed);

        let peers = self
            .registry
            .matching_peers(envelope.pubsub_topic(), envelope.message().content_topic());
        if peers.is_empty() {
            return;
        }

        debug!(
            topic = %envelope.pubsub_topic(),
            content_topic = %envelope.message().content_topic(),
            peers = peers.len(),
            "Dispatching message"
        );

        let topic = envelope.pubsub_topic().to_string();
        let push = Arc::new(MessagePush::new(topic, envelope.into_message()));

        for peer in peers {
            self.metrics.pushes_attempted.fetch_add(1, Ordering::Relaxed);
            let push = Arc::clone(&push);
            let opener = Arc::clone(&self.opener);
            let registry = Arc::clone(&self.registry);
            let metrics = Arc::clone(&self.metrics);
            let push_timeout = self.config.push_timeout();

            in_flight.spawn(async move {
                let result = match timeout(push_timeout, push_to_peer(opener.as_ref(), peer, &push)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(FilterError::Timeout),
                };
                record_outcome(&registry, &metrics, peer, result);
            });
        }
    }
}

async fn push_to_peer(
    opener: &dyn StreamOpener,
    peer: PeerId,
    push: &MessagePush,
) -> Result<(), FilterError> {
    let mut stream = opener.open_stream(peer, ProtocolId::FilterPush).await?;
    write_frame(&mut stream, push).await?;
    stream
        .shutdown()
        .await
        .map_err(|e| FilterError::Codec(e.into()))?;
    Ok(())
}

fn record_outcome(
    registry: &SubscriberRegistry,
    metrics: &DispatchMetrics,
    peer: PeerId,
    result: Result<(), FilterError>,
) {
    match result {
        Ok(()) => {
            registry.flag_success(peer);
            metrics.pushes_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            match registry.flag_failure(peer) {
                FailureOutcome::Evicted => {
                    metrics.peers_evicted.fetch_add(1, Ordering::Relaxed);
                }
                outcome => {
                    warn!(peer = %peer, error = %e, outcome = ?outcome, "Push failed");
                }
            }
            metrics.pushes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryNetwork;
    use crate::domain::ContentFilter;
    use crate::ports::{BoxedStream, StreamHandler, Transport};
    use crate::wire::read_frame;
    use async_trait::async_trait;
    use shared_types::Message;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Records every push it receives.
    struct Collector(mpsc::UnboundedSender<MessagePush>);

    #[async_trait]
    impl StreamHandler for Collector {
        async fn handle_stream(&self, _remote: PeerId, mut stream: BoxedStream) {
            if let Ok(push) = read_frame::<_, MessagePush>(&mut stream, 1 << 20).await {
                let _ = self.0.send(push);
            }
        }
    }

    /// Accepts the stream and never reads from it.
    struct Stall;

    #[async_trait]
    impl StreamHandler for Stall {
        async fn handle_stream(&self, _remote: PeerId, stream: BoxedStream) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(stream);
        }
    }

    fn envelope(ct: &str) -> Envelope {
        Envelope::new(Message::new(ct, vec![0u8; 8]), 0, "/t")
    }

    struct Fixture {
        registry: Arc<SubscriberRegistry>,
        metrics: Arc<DispatchMetrics>,
        source: mpsc::Sender<Envelope>,
        shutdown: watch::Sender<bool>,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(network: &MemoryNetwork, config: FullNodeConfig) -> Fixture {
        let host = network.add_host(PeerId::new([0; 32]));
        let registry = Arc::new(SubscriberRegistry::new(config.clone()));
        let metrics = Arc::new(DispatchMetrics::default());
        let dispatcher = PushDispatcher::new(
            config,
            Arc::clone(&registry),
            host,
            Arc::clone(&metrics),
        );
        let (source, rx) = mpsc::channel(16);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { dispatcher.run(rx, shutdown_rx).await });
        Fixture {
            registry,
            metrics,
            source,
            shutdown,
            task,
        }
    }

    #[tokio::test]
    async fn test_pushes_only_to_matching_peers() {
        let network = MemoryNetwork::new();
        let fixture = start(&network, FullNodeConfig::for_testing());

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let peer_a = PeerId::new([1; 32]);
        network
            .add_host(peer_a)
            .set_handler(ProtocolId::FilterPush, Arc::new(Collector(tx_a)));
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let peer_b = PeerId::new([2; 32]);
        network
            .add_host(peer_b)
            .set_handler(ProtocolId::FilterPush, Arc::new(Collector(tx_b)));

        fixture
            .registry
            .add_filter(peer_a, &ContentFilter::new("/t", ["A"]))
            .unwrap();
        fixture
            .registry
            .add_filter(peer_b, &ContentFilter::new("/t", ["B"]))
            .unwrap();

        fixture.source.send(envelope("A")).await.unwrap();

        let push = tokio::time::timeout(Duration::from_secs(1), rx_a.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(push.pubsub_topic, "/t");
        assert_eq!(push.message.content_topic(), "A");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx_b.try_recv().is_err());

        fixture.shutdown.send(true).unwrap();
        fixture.task.await.unwrap();
        let stats = fixture.metrics.snapshot();
        assert_eq!(stats.messages_consumed, 1);
        assert_eq!(stats.pushes_attempted, 1);
        assert_eq!(stats.pushes_succeeded, 1);
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_flagged_then_cleared() {
        let network = MemoryNetwork::new();
        let fixture = start(&network, FullNodeConfig::for_testing());
        let peer = PeerId::new([1; 32]);
        fixture
            .registry
            .add_filter(peer, &ContentFilter::new("/t", ["A"]))
            .unwrap();

        // Peer not on the network yet
        fixture.source.send(envelope("A")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fixture.registry.is_failed_peer(peer));
        assert!(fixture.registry.has(peer));

        let (tx, mut rx) = mpsc::unbounded_channel();
        network
            .add_host(peer)
            .set_handler(ProtocolId::FilterPush, Arc::new(Collector(tx)));

        fixture.source.send(envelope("A")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fixture.registry.is_failed_peer(peer));

        fixture.shutdown.send(true).unwrap();
        fixture.task.await.unwrap();
        assert_eq!(fixture.metrics.snapshot().pushes_failed, 1);
    }

    #[tokio::test]
    async fn test_stalled_peer_does_not_block_others() {
        let network = MemoryNetwork::with_buffer_size(4);
        let config = FullNodeConfig {
            push_timeout_ms: 300,
            eviction_window_ms: 5_000,
            ..FullNodeConfig::for_testing()
        };
        let fixture = start(&network, config);

        let slow = PeerId::new([1; 32]);
        network
            .add_host(slow)
            .set_handler(ProtocolId::FilterPush, Arc::new(Stall));
        let fast = PeerId::new([2; 32]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        network
            .add_host(fast)
            .set_handler(ProtocolId::FilterPush, Arc::new(Collector(tx)));

        let filter = ContentFilter::new("/t", ["A"]);
        fixture.registry.add_filter(slow, &filter).unwrap();
        fixture.registry.add_filter(fast, &filter).unwrap();

        for _ in 0..3 {
            fixture.source.send(envelope("A")).await.unwrap();
        }
        for _ in 0..3 {
            tokio::time::timeout(Duration::from_millis(200), rx.recv())
                .await
                .expect("fast peer starved")
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(fixture.registry.is_failed_peer(slow));
        assert!(!fixture.registry.is_failed_peer(fast));

        fixture.shutdown.send(true).unwrap();
        fixture.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_source_close_stops_dispatcher() {
        let network = MemoryNetwork::new();
        let fixture = start(&network, FullNodeConfig::for_testing());
        drop(fixture.source);
        tokio::time::timeout(Duration::from_secs(1), fixture.task)
            .await
            .unwrap()
            .unwrap();
    }
}
