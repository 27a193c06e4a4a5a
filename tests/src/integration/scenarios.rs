//! # Protocol Scenarios
//!
//! 1. **Topic filtering**: a subscriber to `{"/t", ["A"]}` gets A, never B
//! 2. **Ping**: 404 before subscribing, Ok after
//! 3. **Failure and eviction**: a flagged peer is cleared by a delivery; a
//!    closed peer is evicted once failures span the eviction window; a peer
//!    receiving pushes is never expired as idle

#[cfg(test)]
mod tests {
    use super::super::{TestNetwork, TOPIC};
    use filter_protocol::{
        ContentFilter, FilterError, FullNodeConfig, StatusCode, StreamOpener, SubscribeOptions,
    };
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // SCENARIO A: TOPIC FILTERING
    // =============================================================================

    #[tokio::test]
    async fn test_subscriber_receives_exactly_matching_message() {
        let net = TestNetwork::start(FullNodeConfig::for_testing());
        let (light, _host) = net.light();
        let mut handle = light
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap();

        net.relay("A", b"hello").await;
        let env = timeout(Duration::from_secs(1), handle.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(env.pubsub_topic(), TOPIC);
        assert_eq!(env.message().content_topic(), "A");
        assert_eq!(env.message().payload(), b"hello");

        net.relay("B", b"ignored").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.try_recv().is_none());
        assert_eq!(net.full.stats().messages_consumed, 2);
        assert_eq!(net.full.stats().pushes_attempted, 1);
        net.full.stop().await;
    }

    #[tokio::test]
    async fn test_other_pubsub_topic_not_delivered() {
        let net = TestNetwork::start(FullNodeConfig::for_testing());
        let (light, _host) = net.light();
        let mut handle = light
            .subscribe(
                ContentFilter::new("/elsewhere", ["A"]),
                SubscribeOptions::default(),
            )
            .await
            .unwrap();

        net.relay("A", b"x").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.try_recv().is_none());
        net.full.stop().await;
    }

    // =============================================================================
    // SCENARIO B: PING
    // =============================================================================

    #[tokio::test]
    async fn test_ping_not_found_then_ok() {
        let net = TestNetwork::start(FullNodeConfig::for_testing());
        let (light, _host) = net.light();

        let err = light.ping(net.full_id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), Some(StatusCode::NotFound.as_u32()));

        let _handle = light
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap();
        light.ping(net.full_id).await.unwrap();

        light.unsubscribe_all(None).await.unwrap();
        assert!(light.ping(net.full_id).await.unwrap_err().is_not_found());
        net.full.stop().await;
    }

    #[tokio::test]
    async fn test_registry_limit_surfaces_as_status() {
        let config = FullNodeConfig {
            max_peers: 1,
            ..FullNodeConfig::for_testing()
        };
        let net = TestNetwork::start(config);
        let (first, _h1) = net.light();
        let (second, _h2) = net.light();

        first
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap();
        let err = second
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FilterError::Status { .. }));
        assert_eq!(
            err.status_code(),
            Some(StatusCode::ServiceUnavailable.as_u32())
        );
        assert!(second.subscriptions().is_empty());
        net.full.stop().await;
    }

    // =============================================================================
    // SCENARIO C: FAILURE AND EVICTION
    // =============================================================================

    #[tokio::test]
    async fn test_transient_failure_cleared_by_delivery() {
        let net = TestNetwork::start(FullNodeConfig::for_testing());
        let (light, host) = net.light();
        let peer = host.local_peer_id();
        let mut handle = light
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap();

        let registry = net.full.registry();
        registry.flag_failure(peer);
        assert!(registry.is_failed_peer(peer));

        net.relay("A", b"1").await;
        timeout(Duration::from_secs(1), handle.recv())
            .await
            .unwrap()
            .unwrap();
        net.settled(1).await;
        assert!(registry.has(peer));
        assert!(!registry.is_failed_peer(peer));
        net.full.stop().await;
    }

    #[tokio::test]
    async fn test_closed_peer_evicted_after_window() {
        let config = FullNodeConfig {
            eviction_window_ms: 100,
            ..FullNodeConfig::for_testing()
        };
        let net = TestNetwork::start(config);
        let (light, host) = net.light();
        let peer = host.local_peer_id();
        light
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap();

        host.close();
        let registry = net.full.registry();

        net.relay("A", b"1").await;
        net.settled(1).await;
        assert!(registry.has(peer));

        tokio::time::sleep(Duration::from_millis(150)).await;
        net.relay("A", b"2").await;
        net.settled(2).await;
        assert!(!registry.has(peer));
        assert!(!registry.is_failed_peer(peer));

        let stats = net.full.stats();
        assert_eq!(stats.pushes_failed, 2);
        assert_eq!(stats.peers_evicted, 1);
        net.full.stop().await;
    }

    #[tokio::test]
    async fn test_sweep_evicts_peer_failing_past_ttl() {
        let config = FullNodeConfig {
            eviction_window_ms: 60_000,
            failed_peer_ttl_secs: 1,
            maintenance_interval_ms: 50,
            ..FullNodeConfig::for_testing()
        };
        let net = TestNetwork::start(config);
        let (light, host) = net.light();
        let peer = host.local_peer_id();
        light
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap();

        host.close();
        net.relay("A", b"1").await;
        net.settled(1).await;
        let registry = net.full.registry();
        assert!(registry.has(peer));

        let evicted = timeout(Duration::from_secs(3), async {
            while registry.has(peer) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(evicted.is_ok());
        assert_eq!(net.full.stats().peers_evicted, 1);
        net.full.stop().await;
    }

    #[tokio::test]
    async fn test_active_subscriber_survives_idle_timeout() {
        let config = FullNodeConfig {
            idle_subscription_timeout_secs: 1,
            maintenance_interval_ms: 50,
            ..FullNodeConfig::for_testing()
        };
        let net = TestNetwork::start(config);
        let (light, host) = net.light();
        let peer = host.local_peer_id();
        let mut handle = light
            .subscribe(ContentFilter::new(TOPIC, ["A"]), SubscribeOptions::default())
            .await
            .unwrap();

        for i in 0..8u8 {
            tokio::time::sleep(Duration::from_millis(400)).await;
            net.relay("A", &[i]).await;
            let env = timeout(Duration::from_secs(1), handle.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(env.message().payload(), &[i]);
        }
        net.settled(8).await;
        assert!(net.full.registry().has(peer));
        assert_eq!(net.full.stats().pushes_succeeded, 8);
        net.full.stop().await;
    }
}
