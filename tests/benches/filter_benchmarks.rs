//! # Content Filter Benchmarks
//!
//! | Path | Operation | Target |
//! |------|-----------|--------|
//! | Registry | `matching_peers` over N subscribers | < 1ms at 1000 peers |
//! | Filter | `ContentFilter::matches` | < 100ns |
//! | Wire | `MessagePush` bincode encode/decode | < 10µs at 1 KiB |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use filter_protocol::{ContentFilter, FullNodeConfig, MessagePush, SubscriberRegistry};
use rand::Rng;
use shared_types::{Message, PeerId};

const TOPIC: &str = "/waku/2/default-waku/proto";

fn populated_registry(peers: usize, topics_per_peer: usize) -> SubscriberRegistry {
    let config = FullNodeConfig {
        max_peers: peers,
        ..FullNodeConfig::default()
    };
    let registry = SubscriberRegistry::new(config);
    let mut rng = rand::thread_rng();
    for _ in 0..peers {
        let topics: Vec<String> = (0..topics_per_peer)
            .map(|_| format!("ct-{}", rng.gen_range(0..256)))
            .collect();
        let _ = registry.add_filter(PeerId::random(), &ContentFilter::new(TOPIC, topics));
    }
    registry
}

fn bench_registry_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry-matching");

    for peers in [10, 100, 1000] {
        let registry = populated_registry(peers, 8);
        group.throughput(Throughput::Elements(peers as u64));
        group.bench_with_input(BenchmarkId::new("matching_peers", peers), &registry, |b, r| {
            b.iter(|| black_box(r.matching_peers(TOPIC, "ct-7")))
        });
    }

    group.finish();
}

fn bench_filter_matches(c: &mut Criterion) {
    let filter = ContentFilter::new(TOPIC, (0..30).map(|i| format!("ct-{i}")));

    c.bench_function("filter_matches_hit", |b| {
        b.iter(|| black_box(filter.matches(black_box(TOPIC), black_box("ct-17"))))
    });
    c.bench_function("filter_matches_miss", |b| {
        b.iter(|| black_box(filter.matches(black_box("/other"), black_box("ct-17"))))
    });
}

fn bench_push_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("push-codec");

    for size in [64usize, 1024, 16 * 1024] {
        let payload: Vec<u8> = (0..size).map(|i| i as u8).collect();
        let push = MessagePush::new(TOPIC, Message::new("ct", payload));
        let encoded = bincode::serialize(&push).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &push, |b, p| {
            b.iter(|| black_box(bincode::serialize(p).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, e| {
            b.iter(|| black_box(bincode::deserialize::<MessagePush>(e).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_registry_matching,
    bench_filter_matches,
    bench_push_codec
);
criterion_main!(benches);
