//! # Filter Full Node
//!
//! Wires the [`FilterSubscribeServer`], the [`PushDispatcher`] and the
//! registry maintenance sweep onto one transport.
//!
//! ## Shutdown
//!
//! [`FilterFullNode::stop`] stops accepting subscribe streams, stops
//! consuming the broadcast source, drains in-flight pushes (bounded by the
//! drain timeout) and ends the maintenance task.

pub mod dispatcher;
pub mod server;

pub use dispatcher::{DispatchMetrics, PushDispatcher};
pub use server::FilterSubscribeServer;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::FullNodeConfig;
use crate::domain::{DispatchStats, FilterError, SubscriberRegistry};
use crate::ports::{BroadcastSource, StreamOpener, Transport};
use crate::wire::ProtocolId;

/// A running (or startable) filter service.
pub struct FilterFullNode<T: Transport + 'static> {
    config: FullNodeConfig,
    registry: Arc<SubscriberRegistry>,
    transport: Arc<T>,
    metrics: Arc<DispatchMetrics>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Transport + 'static> FilterFullNode<T> {
    pub fn new(config: FullNodeConfig, transport: Arc<T>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry: Arc::new(SubscriberRegistry::new(config.clone())),
            config,
            transport,
            metrics: Arc::new(DispatchMetrics::default()),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Serve subscribe requests and dispatch messages from `source`.
    pub fn start<S>(&self, source: S) -> Result<(), FilterError>
    where
        S: BroadcastSource + 'static,
    {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Err(FilterError::AlreadyStarted);
        }
        self.shutdown.send_replace(false);

        let server = FilterSubscribeServer::new(self.config.clone(), Arc::clone(&self.registry));
        self.transport
            .set_handler(ProtocolId::FilterSubscribe, Arc::new(server));

        let dispatcher = PushDispatcher::new(
            self.config.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.transport) as Arc<dyn StreamOpener>,
            Arc::clone(&self.metrics),
        );
        let shutdown_rx = self.shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            dispatcher.run(source, shutdown_rx).await;
        }));

        tasks.push(tokio::spawn(run_maintenance(
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            self.config.clone(),
            self.shutdown.subscribe(),
        )));

        info!(peer = %self.transport.local_peer_id(), "Filter full node started");
        Ok(())
    }

    /// Stop serving and wait for background tasks to finish.
    pub async fn stop(&self) {
        self.transport.remove_handler(ProtocolId::FilterSubscribe);
        self.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Full node task failed");
            }
        }
        info!("Filter full node stopped");
    }

    /// Shared handle to the subscriber registry.
    pub fn registry(&self) -> Arc<SubscriberRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn stats(&self) -> DispatchStats {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &FullNodeConfig {
        &self.config
    }
}

/// Periodically evict long-failing and idle subscribers.
async fn run_maintenance(
    registry: Arc<SubscriberRegistry>,
    metrics: Arc<DispatchMetrics>,
    config: FullNodeConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.maintenance_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = registry.sweep();
                if !removed.is_empty() {
                    metrics.record_evictions(removed.len());
                    info!(removed = removed.len(), remaining = registry.peer_count(), "Subscriber sweep");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryNetwork;
    use crate::domain::ContentFilter;
    use shared_types::{Envelope, PeerId};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_start_twice_fails() {
        let network = MemoryNetwork::new();
        let node = FilterFullNode::new(
            FullNodeConfig::for_testing(),
            network.add_host(PeerId::new([0; 32])),
        );
        let (_tx, rx) = mpsc::channel::<Envelope>(1);
        node.start(rx).unwrap();

        let (_tx2, rx2) = mpsc::channel::<Envelope>(1);
        assert!(matches!(node.start(rx2), Err(FilterError::AlreadyStarted)));
        node.stop().await;
    }

    #[tokio::test]
    async fn test_maintenance_sweeps_failing_peers() {
        let network = MemoryNetwork::new();
        let config = FullNodeConfig {
            failed_peer_ttl_secs: 0,
            ..FullNodeConfig::for_testing()
        };
        let node = FilterFullNode::new(config, network.add_host(PeerId::new([0; 32])));
        let (_tx, rx) = mpsc::channel::<Envelope>(1);
        node.start(rx).unwrap();

        let peer = PeerId::new([1; 32]);
        let registry = node.registry();
        registry
            .add_filter(peer, &ContentFilter::new("/t", ["A"]))
            .unwrap();
        registry.flag_failure(peer);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!registry.has(peer));
        assert_eq!(node.stats().peers_evicted, 1);
        node.stop().await;
    }
}
