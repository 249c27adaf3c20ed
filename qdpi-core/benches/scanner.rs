use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qdpi_core::{
    batch::encode_records,
    scanner::{scan_records, scan_records_with_stats},
    EccCodec,
};

fn make_stream(num_blocks: usize) -> Vec<u8> {
    let codec = EccCodec::default();
    let data = vec![b'x'; num_blocks * 223];
    let mut stream = Vec::new();
    for (i, record) in encode_records(&codec, &data, 0, false)
        .unwrap()
        .iter()
        .enumerate()
    {
        stream.extend_from_slice(record);
        if i % 10 == 0 {
            // inject a bit of garbage periodically
            stream.extend_from_slice(b"GARBAGE");
        }
    }
    stream
}

fn bench_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");

    for &blocks in &[16usize, 256, 2048] {
        let stream = make_stream(blocks);
        group.throughput(Throughput::Bytes(stream.len() as u64));

        group.bench_with_input(BenchmarkId::new("scan_records", blocks), &stream, |b, data| {
            b.iter(|| {
                let res = scan_records(data);
                criterion::black_box(res);
            });
        });

        group.bench_with_input(
            BenchmarkId::new("scan_records_with_stats", blocks),
            &stream,
            |b, data| {
                b.iter(|| {
                    let res = scan_records_with_stats(data);
                    criterion::black_box(res);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_scanner);
criterion_main!(benches);
