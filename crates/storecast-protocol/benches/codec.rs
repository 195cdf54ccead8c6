//! Codec benchmarks for storecast-protocol.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use storecast_protocol::payload::encode_snapshot;
use storecast_protocol::{codec, Frame, TableSnapshot, TableStatus};

fn snapshot_payload() -> String {
    let tables: Vec<_> = (1..=50)
        .map(|table_no| TableSnapshot {
            table_no,
            status: TableStatus::ALL[table_no as usize % 3],
        })
        .collect();
    encode_snapshot(&tables).unwrap()
}

fn bench_encode_snapshot(c: &mut Criterion) {
    let frame = Frame::data(snapshot_payload());

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(frame.data_str().map_or(0, str::len) as u64));
    group.bench_function("snapshot_50_tables", |b| {
        b.iter(|| codec::encode(black_box(&frame)))
    });
    group.finish();
}

fn bench_decode_snapshot(c: &mut Criterion) {
    let encoded = codec::encode(&Frame::data(snapshot_payload())).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("snapshot_50_tables", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(black_box(&encoded[..]));
            codec::decode_from(&mut buf).unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_encode_snapshot, bench_decode_snapshot);
criterion_main!(benches);
