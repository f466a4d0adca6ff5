//! DTN routing performance benchmarks
//!
//! Benchmarks for critical routing operations:
//! - Tick decisions over busy buffers
//! - Receipt exchange at link-up
//! - Congestion updates at link-down
//! - Drop-oldest eviction
//!
//! Run with: cargo bench -p iql-dtn

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use iql_core::{LinkId, MemoryHost, Message, SimNodeId, SimTime};
use iql_dtn::{
    CongestionConfig, CongestionEstimator, CongestionTelemetry, DtnConfig, EpidemicRouter,
    Receipt, ReceiptCache, TransferPolicy,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn node(index: u32) -> SimNodeId {
    SimNodeId::new(index)
}

fn loaded_host(messages: usize, links: u64) -> MemoryHost<SimNodeId> {
    let mut host = MemoryHost::new(node(0), messages * 100);
    for i in 0..messages {
        let mut m = Message::new(
            format!("m{}", i),
            node(0),
            node(1000 + i as u32),
            100,
            SimTime(3600.0),
            SimTime(i as f64),
        );
        m.received_at = SimTime(i as f64);
        // ignore duplicates; ids are unique here
        let _ = host.insert(m);
    }
    for l in 0..links {
        host.connect(LinkId(l), node(1 + l as u32));
    }
    host
}

fn receipts(count: usize) -> ReceiptCache {
    let mut cache = ReceiptCache::new();
    for i in 0..count {
        cache.insert_if_absent(
            format!("r{}", i).into(),
            Receipt::new(SimTime(i as f64), SimTime(3600.0)),
        );
    }
    cache
}

// ============================================================================
// Router Benchmarks
// ============================================================================

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for (messages, links) in [(100usize, 1u64), (1000, 8)] {
        group.bench_function(format!("tick_{}_messages_{}_links", messages, links), |b| {
            b.iter_batched(
                || {
                    let mut host = loaded_host(messages, links);
                    let mut router: EpidemicRouter<SimNodeId> =
                        EpidemicRouter::new(DtnConfig::default());
                    for l in 0..links {
                        router.link_up(&mut host, LinkId(l), &ReceiptCache::new());
                    }
                    (host, router)
                },
                |(mut host, mut router)| router.tick(black_box(&mut host)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_link_up(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_up");

    let peer = receipts(1000);
    group.bench_function("merge_1000_receipts", |b| {
        b.iter_batched(
            || {
                (
                    loaded_host(500, 1),
                    EpidemicRouter::<SimNodeId>::new(DtnConfig::default()),
                )
            },
            |(mut host, mut router)| router.link_up(&mut host, LinkId(0), black_box(&peer)),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_congestion(c: &mut Criterion) {
    let mut group = c.benchmark_group("congestion");

    group.bench_function("link_down_update", |b| {
        let mut estimator = CongestionEstimator::new(CongestionConfig::default());
        let peer = CongestionTelemetry {
            drops: 3,
            replications: 12,
        };
        let mut t = 0.0;
        b.iter(|| {
            estimator.record_replication();
            t += 1.0;
            estimator.on_link_down(SimTime(t), black_box(peer.into()), black_box(7))
        })
    });

    group.finish();
}

fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction");

    group.bench_function("make_room_evict_10_of_1000", |b| {
        b.iter_batched(
            || {
                (
                    loaded_host(1000, 0),
                    EpidemicRouter::<SimNodeId>::new(DtnConfig::default()),
                )
            },
            |(mut host, mut router)| router.make_room_for(&mut host, black_box(1000)),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

// ============================================================================
// Config Validation Benchmarks
// ============================================================================

fn bench_config(c: &mut Criterion) {
    let mut group = c.benchmark_group("config");

    group.bench_function("validate_default_config", |b| {
        let config = DtnConfig::default();
        b.iter(|| config.validate())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_tick,
    bench_link_up,
    bench_congestion,
    bench_eviction,
    bench_config,
);

criterion_main!(benches);
