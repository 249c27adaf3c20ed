use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use qdpi_core::{batch::encode_stream, inner::InnerCode, EccCodec, OuterCode};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("outer_encode");
    let outer = OuterCode::new();

    for size in [16usize, 128, 223] {
        let data = vec![0x42u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| outer.encode_codeword(black_box(data)).unwrap());
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("outer_decode");
    let outer = OuterCode::new();
    let data: Vec<u8> = (0..223).map(|i| i as u8).collect();
    let clean = outer.encode_codeword(&data).unwrap();

    for errors in [0usize, 1, 8, 16] {
        let mut received = clean;
        for i in 0..errors {
            received[i * 15] ^= 0x5A;
        }
        group.throughput(Throughput::Bytes(255));
        group.bench_with_input(BenchmarkId::new("errors", errors), &received, |b, cw| {
            b.iter(|| outer.decode(black_box(cw), 223).unwrap());
        });
    }

    group.finish();
}

fn bench_combined(c: &mut Criterion) {
    let mut group = c.benchmark_group("ecc_codec");
    let codec = EccCodec::default();
    let inner = InnerCode::default();
    let data: Vec<u8> = (0..223).map(|i| (i * 31) as u8).collect();
    let protected = codec.encode_with_protection(&data, 0).unwrap();

    group.bench_function("decode_with_correction", |b| {
        b.iter(|| {
            codec
                .decode_with_correction(black_box(&protected.block.codeword), 223)
                .unwrap()
        });
    });

    group.bench_function("inner_detect", |b| {
        b.iter(|| inner.detect(black_box(&data)));
    });

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_encode");
    let codec = EccCodec::default();

    for size in [4096usize, 65536] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || vec![0x17u8; size],
                |data| encode_stream(&codec, &data, 0).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_combined, bench_batch);
criterion_main!(benches);
