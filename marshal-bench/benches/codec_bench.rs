//! Buffer codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use marshal_buffer::{composite, Codec, Timestamp};
use tokio::runtime::Runtime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct Sample {
    id: Uuid,
    sequence: u64,
    load: f32,
    created: Timestamp,
    online: bool,
}

composite!(Sample {
    id: Uuid,
    sequence: u64,
    load: f32,
    created: Timestamp,
    online: bool,
});

#[derive(Debug, Clone, PartialEq)]
struct Note {
    author: String,
    priority: i32,
    body: String,
}

composite!(Note {
    author: String,
    priority: i32,
    body: String,
});

fn sample() -> Sample {
    Sample {
        id: Uuid::new_v4(),
        sequence: 42,
        load: 0.75,
        created: Timestamp::from_ticks(638_450_000_000_000_000),
        online: true,
    }
}

fn note(size: usize) -> Note {
    Note {
        author: "bench".to_string(),
        priority: 3,
        body: "x".repeat(size),
    }
}

fn bench_fixed_encode(c: &mut Criterion) {
    let codec = Codec::new();
    let value = sample();

    let mut group = c.benchmark_group("fixed_encode");
    group.throughput(Throughput::Elements(1));
    group.bench_function("sample", |b| {
        b.iter(|| black_box(codec.encode(&value).unwrap()));
    });
    group.finish();
}

fn bench_fixed_decode(c: &mut Criterion) {
    let codec = Codec::new();
    let encoded = codec.encode(&sample()).unwrap();

    let mut group = c.benchmark_group("fixed_decode");
    group.throughput(Throughput::Elements(1));
    group.bench_function("sample", |b| {
        b.iter(|| black_box(codec.decode::<Sample>(&encoded).unwrap()));
    });
    group.finish();
}

fn bench_managed_encode(c: &mut Criterion) {
    let codec = Codec::new();
    let mut group = c.benchmark_group("managed_encode");

    for size in [100, 1000, 10000, 100000] {
        let value = note(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter(|| black_box(codec.encode_managed(value).unwrap()));
        });
    }

    group.finish();
}

fn bench_managed_decode(c: &mut Criterion) {
    let codec = Codec::new();
    let mut group = c.benchmark_group("managed_decode");

    for size in [100, 1000, 10000, 100000] {
        let encoded = codec.encode_managed(&note(size)).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| black_box(codec.decode_managed::<Note>(encoded).unwrap()));
        });
    }

    group.finish();
}

fn bench_managed_stream(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let codec = Codec::new();
    let mut group = c.benchmark_group("managed_stream");

    for size in [100, 10000] {
        let value = note(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.to_async(&rt).iter(move || async move {
                let mut out = Vec::with_capacity(size + 32);
                codec.write_managed(&mut out, value).await.unwrap();
                let decoded: Note = codec
                    .read_managed(&mut std::io::Cursor::new(out))
                    .await
                    .unwrap();
                black_box(decoded)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fixed_encode,
    bench_fixed_decode,
    bench_managed_encode,
    bench_managed_decode,
    bench_managed_stream,
);

criterion_main!(benches);
