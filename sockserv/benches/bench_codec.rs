//! Codec benchmark - framing and unmasking across the three length encodings

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sockserv::codec;
use sockserv::handshake;

const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];
const SIZES: [usize; 4] = [64, 125, 4096, 65536];

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    for size in SIZES {
        let payload = vec![0x42u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| codec::frame(black_box(payload)))
        });
    }
    group.finish();
}

fn bench_unmask(c: &mut Criterion) {
    let mut group = c.benchmark_group("unmask");
    for size in SIZES {
        let raw = codec::mask_frame(&vec![0x42u8; size], KEY);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &raw, |b, raw| {
            b.iter(|| codec::unmask(black_box(raw)).unwrap())
        });
    }
    group.finish();
}

fn bench_accept_key(c: &mut Criterion) {
    c.bench_function("accept_key", |b| {
        b.iter(|| handshake::accept_key(black_box("dGhlIHNhbXBsZSBub25jZQ==")))
    });
}

criterion_group!(benches, bench_frame, bench_unmask, bench_accept_key);
criterion_main!(benches);
