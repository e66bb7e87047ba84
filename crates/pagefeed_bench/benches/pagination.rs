//! Page building benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pagefeed_bench::sequenced_store;
use pagefeed_codec::BytesCodec;
use pagefeed_core::{FeedConfig, Paginator};
use pagefeed_server::{FeedServer, ServerConfig};

const FEED_LEN: usize = 10_000;

/// Benchmark building the head page and a deep archive page.
fn bench_build_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_page");

    for page_size in [10, 50, 200].iter() {
        let store = sequenced_store(FEED_LEN, 128);
        let paginator =
            Paginator::new(store, FeedConfig::new().with_page_size(*page_size)).unwrap();
        let last = paginator.last_page_index().unwrap();

        group.throughput(Throughput::Elements(*page_size as u64));
        group.bench_with_input(BenchmarkId::new("head", page_size), page_size, |b, _| {
            b.iter(|| black_box(paginator.build_page(black_box(0)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("oldest", page_size), page_size, |b, _| {
            b.iter(|| black_box(paginator.build_page(black_box(last)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark answering a page request end to end, CBOR encoding included.
fn bench_handle_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_get");

    for page_size in [10, 50, 200].iter() {
        let config = ServerConfig::new(FeedConfig::new().with_page_size(*page_size));
        let server =
            FeedServer::new(config, sequenced_store(FEED_LEN, 128), BytesCodec).unwrap();
        let path = format!("/1/{}", page_size);

        group.throughput(Throughput::Elements(*page_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(page_size), page_size, |b, _| {
            b.iter(|| {
                let response = server.handle_get(black_box(&path));
                assert_eq!(response.status, 200);
                black_box(response);
            });
        });
    }

    group.finish();
}

/// Benchmark decoding a wire page.
fn bench_page_from_wire(c: &mut Criterion) {
    let config = ServerConfig::new(FeedConfig::new().with_page_size(50));
    let server = FeedServer::new(config, sequenced_store(1_000, 128), BytesCodec).unwrap();
    let body = server.handle_get("/1/50").body;

    c.bench_function("page_from_wire", |b| {
        b.iter(|| {
            black_box(pagefeed_protocol::FeedPage::<Vec<u8>>::from_wire(black_box(&body)).unwrap())
        });
    });
}

criterion_group!(benches, bench_build_page, bench_handle_get, bench_page_from_wire);
criterion_main!(benches);
