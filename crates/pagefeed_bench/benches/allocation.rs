//! Allocation round benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use pagefeed_bench::pending_entries;
use pagefeed_codec::BytesCodec;
use pagefeed_core::{
    AllocationConfig, AllocationOrder, EntryStore, LogEntryStore, MemoryEntryStore,
    OrderKeyAllocator, SequencedStore,
};
use pagefeed_storage::MemoryRecordLog;
use std::sync::Arc;

/// Benchmark one allocation round over a batch of pending entries.
fn bench_memory_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_memory");

    for pending in [10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*pending as u64));
        group.bench_with_input(BenchmarkId::from_parameter(pending), pending, |b, &pending| {
            b.iter_batched(
                || {
                    let store = Arc::new(MemoryEntryStore::new());
                    store.push(pending_entries(pending, 64)).unwrap();
                    OrderKeyAllocator::<Vec<u8>, _>::new(store, AllocationConfig::default())
                },
                |allocator| black_box(allocator.assign_pending_positions().unwrap()),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark ordering by creation time against insertion order.
fn bench_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_order");
    let orders = [
        ("insertion", AllocationOrder::Insertion),
        ("created_at", AllocationOrder::CreatedAt),
    ];

    for (name, order) in orders.iter() {
        group.bench_function(*name, |b| {
            b.iter_batched(
                || {
                    let store = Arc::new(MemoryEntryStore::new());
                    store.push(pending_entries(500, 16)).unwrap();
                    let config = AllocationConfig::new().with_order(order.clone());
                    OrderKeyAllocator::<Vec<u8>, _>::new(store, config)
                },
                |allocator| black_box(allocator.assign_pending_positions().unwrap()),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark a round against the log-backed store, record append included.
fn bench_log_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_log");

    for pending in [10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*pending as u64));
        group.bench_with_input(BenchmarkId::from_parameter(pending), pending, |b, &pending| {
            b.iter_batched(
                || {
                    let store =
                        Arc::new(LogEntryStore::open(MemoryRecordLog::new(), BytesCodec).unwrap());
                    store.push(pending_entries(pending, 64)).unwrap();
                    OrderKeyAllocator::<Vec<u8>, _>::new(store, AllocationConfig::default())
                },
                |allocator| {
                    let report = allocator.assign_pending_positions().unwrap();
                    black_box(report)
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark taking an allocation snapshot with many entries already sequenced.
fn bench_snapshot(c: &mut Criterion) {
    let store = pagefeed_bench::sequenced_store(50_000, 16);
    store.push(pending_entries(100, 16)).unwrap();

    c.bench_function("allocation_snapshot", |b| {
        b.iter(|| black_box(store.allocation_snapshot().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_memory_round,
    bench_order,
    bench_log_round,
    bench_snapshot
);
criterion_main!(benches);
