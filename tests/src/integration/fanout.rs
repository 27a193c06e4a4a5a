//! # Fan-out
//!
//! Many subscribers on one full node: every matching subscriber gets each
//! message, and a stalled subscriber delays nobody else.

#[cfg(test)]
mod tests {
    use super::super::{TestNetwork, TOPIC};
    use async_trait::async_trait;
    use filter_protocol::adapters::MemoryNetwork;
    use filter_protocol::{
        BoxedStream, ContentFilter, FullNodeConfig, ProtocolId, StreamHandler, SubscribeOptions,
        Transport,
    };
    use futures::future::join_all;
    use shared_types::PeerId;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::time::timeout;

    const SUBSCRIBERS: usize = 16;

    /// Accepts push streams and never reads them.
    struct Stalled;

    #[async_trait]
    impl StreamHandler for Stalled {
        async fn handle_stream(&self, _remote: PeerId, stream: BoxedStream) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(stream);
        }
    }

    #[tokio::test]
    async fn test_every_matching_subscriber_receives() {
        let net = TestNetwork::start(FullNodeConfig::for_testing());
        let lights: Vec<_> = (0..SUBSCRIBERS).map(|_| net.light()).collect();

        let handles = join_all(lights.iter().enumerate().map(|(i, (light, _))| {
            let topic = if i % 2 == 0 { "even" } else { "odd" };
            light.subscribe(
                ContentFilter::new(TOPIC, [topic, "all"]),
                SubscribeOptions::default(),
            )
        }))
        .await;
        let mut handles: Vec<_> = handles.into_iter().map(Result::unwrap).collect();
        assert_eq!(net.full.registry().peer_count(), SUBSCRIBERS);

        net.relay("all", b"x").await;
        net.relay("even", b"y").await;
        net.settled((SUBSCRIBERS + SUBSCRIBERS / 2) as u64).await;

        for (i, handle) in handles.iter_mut().enumerate() {
            let expected: &[&str] = if i % 2 == 0 { &["all", "even"] } else { &["all"] };
            let mut received = Vec::new();
            for _ in expected {
                let env = timeout(Duration::from_secs(1), handle.recv())
                    .await
                    .unwrap()
                    .unwrap();
                received.push(env.message().content_topic().to_string());
            }
            // Pushes to one peer run on separate tasks and may arrive in any order.
            received.sort();
            assert_eq!(received, expected, "subscriber {i}");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        for handle in handles.iter_mut().skip(1).step_by(2) {
            assert!(handle.try_recv().is_none());
        }
        net.full.stop().await;
    }

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_delay_others() {
        let network = MemoryNetwork::with_buffer_size(16);
        let config = FullNodeConfig {
            push_timeout_ms: 2_000,
            ..FullNodeConfig::for_testing()
        };
        let net = TestNetwork::start_on(network, config);

        let stalled = PeerId::random();
        net.network
            .add_host(stalled)
            .set_handler(ProtocolId::FilterPush, Arc::new(Stalled));
        net.full
            .registry()
            .add_filter(stalled, &ContentFilter::new(TOPIC, ["A"]))
            .unwrap();

        let (light, _host) = net.light();
        let mut handle = light
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap();

        let started = Instant::now();
        net.relay("A", &[0u8; 4096]).await;
        net.relay("A", &[1u8; 4096]).await;
        for _ in 0..2 {
            timeout(Duration::from_millis(500), handle.recv())
                .await
                .unwrap()
                .unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(500));
        net.full.stop().await;
    }
}
