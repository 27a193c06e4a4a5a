//! # Integration Fixtures
//!
//! One full node fed by an [`InMemoryBroadcaster`] plus any number of light
//! nodes, all joined on a [`MemoryNetwork`].

pub mod fanout;
pub mod scenarios;

use filter_protocol::adapters::{MemoryHost, MemoryNetwork};
use filter_protocol::{FilterFullNode, FilterLightNode, FullNodeConfig, LightNodeConfig};
use shared_bus::{InMemoryBroadcaster, MessagePublisher, TopicFilter};
use shared_types::{Envelope, Message, PeerId};
use std::sync::Arc;
use std::time::Duration;

/// Pubsub topic used by every scenario.
pub const TOPIC: &str = "/t";

pub struct TestNetwork {
    pub network: MemoryNetwork,
    pub bus: InMemoryBroadcaster,
    pub full: FilterFullNode<MemoryHost>,
    pub full_id: PeerId,
}

impl TestNetwork {
    /// Start a full node. Must run inside a tokio runtime.
    pub fn start(config: FullNodeConfig) -> Self {
        Self::start_on(MemoryNetwork::new(), config)
    }

    pub fn start_on(network: MemoryNetwork, config: FullNodeConfig) -> Self {
        let full_id = PeerId::random();
        let bus = InMemoryBroadcaster::new();
        let full = FilterFullNode::new(config, network.add_host(full_id));
        full.start(bus.register(TopicFilter::all()))
            .expect("fresh full node starts");
        Self {
            network,
            bus,
            full,
            full_id,
        }
    }

    /// Join a started light node that knows the full node as service peer.
    pub fn light(&self) -> (FilterLightNode<MemoryHost>, Arc<MemoryHost>) {
        let host = self.network.add_host(PeerId::random());
        let config = LightNodeConfig {
            service_peers: vec![self.full_id],
            ..LightNodeConfig::for_testing()
        };
        let light = FilterLightNode::new(config, Arc::clone(&host));
        light.start().expect("fresh light node starts");
        (light, host)
    }

    pub async fn relay(&self, content_topic: &str, payload: &[u8]) {
        let message = Message::new(content_topic, payload.to_vec());
        self.bus.publish(Envelope::new(message, 0, TOPIC)).await;
    }

    /// Wait until `n` pushes have completed or failed.
    pub async fn settled(&self, n: u64) {
        let waited = tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                let stats = self.full.stats();
                if stats.pushes_succeeded + stats.pushes_failed >= n {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "dispatcher did not settle {n} pushes");
    }
}
