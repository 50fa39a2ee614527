//! Protocol encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use endpointd_protocol::frame::Frame;
use endpointd_protocol::{Endpoint, EndpointBuilder, EndpointView};

fn create_test_endpoint(url_size: usize) -> Endpoint {
    Endpoint::new(
        "6f1c1a52-8a1e-4c59-9d1f-0d8f5b1f2c3a",
        "org-12345",
        format!("https://hooks.example.com/{}", "x".repeat(url_size)),
    )
    .with_schema("{\"type\":\"object\"}")
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 1000, 10000] {
        let payload = Bytes::from("x".repeat(size));
        let frame = Frame::new(payload.clone());

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [100, 1000, 10000] {
        let payload = Bytes::from("x".repeat(size));
        let frame = Frame::new(payload);
        let encoded = frame.encode().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                black_box(Frame::decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_endpoint_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("endpoint_encode");

    for size in [100, 1000, 10000] {
        let endpoint = create_test_endpoint(size);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("reused_builder", size),
            &endpoint,
            |b, endpoint| {
                let mut builder = EndpointBuilder::new();
                b.iter(|| black_box(builder.encode(endpoint).len()));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("fresh_builder", size),
            &endpoint,
            |b, endpoint| {
                b.iter(|| black_box(EndpointBuilder::new().encode(endpoint).len()));
            },
        );
    }

    group.finish();
}

fn bench_endpoint_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("endpoint_view");

    for size in [100, 1000, 10000] {
        let encoded = EndpointBuilder::new()
            .encode(&create_test_endpoint(size))
            .to_vec();

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::new("fields", size), &encoded, |b, encoded| {
            b.iter(|| {
                let view = EndpointView::new(encoded).unwrap();
                black_box((view.id(), view.url(), view.action()))
            });
        });
        group.bench_with_input(BenchmarkId::new("owned", size), &encoded, |b, encoded| {
            b.iter(|| black_box(EndpointView::new(encoded).unwrap().to_endpoint()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_endpoint_encode,
    bench_endpoint_view,
);

criterion_main!(benches);
