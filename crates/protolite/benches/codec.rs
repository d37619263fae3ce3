//! Benchmark encode/decode throughput for typed and schema-driven paths

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use protolite::{
    parse_schema, DynamicMessage, Message, PlaybackFile, PlaybackHeader, PLAYBACK_SCHEMA,
};

fn playback(body_len: usize) -> PlaybackFile {
    PlaybackFile::new(PlaybackHeader::new(1010, 1.234, 5.678), vec![0xAB; body_len])
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for body_len in [0usize, 64, 4096] {
        let file = playback(body_len);
        group.throughput(Throughput::Bytes(file.encoded_len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(body_len), &file, |b, file| {
            b.iter(|| black_box(file).encode_to_vec());
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for body_len in [0usize, 64, 4096] {
        let bytes = playback(body_len).encode_to_vec();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(body_len), &bytes, |b, bytes| {
            b.iter(|| PlaybackFile::decode(black_box(bytes)).unwrap());
        });
    }
    group.finish();
}

fn bench_dynamic_decode(c: &mut Criterion) {
    let schema = parse_schema(PLAYBACK_SCHEMA).unwrap();
    let bytes = playback(64).encode_to_vec();

    c.bench_function("dynamic_decode_playback", |b| {
        b.iter(|| DynamicMessage::decode(&schema, "PlaybackFile", black_box(&bytes)).unwrap());
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_dynamic_decode);
criterion_main!(benches);
