//! Hot-path benchmarks for the disguise pipeline.
//!
//! Every tunnel byte goes through seal + chunk assembly on the way out and
//! frame parse + open on the way in, so these are the numbers that bound
//! proxy throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use minewire::codec::{frame, Reader, Writer};
use minewire::crypto::{tunnel_key, Aead};
use minewire::tunnel::disguise;

fn bench_var_int(c: &mut Criterion) {
    c.bench_function("var_int_encode", |b| {
        b.iter(|| {
            let mut w = Writer::with_capacity(5);
            w.write_var_int(black_box(1_048_576));
            black_box(w.into_inner())
        })
    });

    let mut w = Writer::new();
    w.write_var_int(1_048_576);
    let bytes = w.into_inner();
    c.bench_function("var_int_decode", |b| {
        b.iter(|| {
            let mut r = Reader::new(black_box(&bytes));
            black_box(r.read_var_int().unwrap())
        })
    });
}

fn bench_seal(c: &mut Criterion) {
    let aead = Aead::new(&tunnel_key("hunter2"));
    let plaintext = vec![0u8; 16 * 1024]; // one full mux frame

    let mut group = c.benchmark_group("aead_seal");
    group.throughput(Throughput::Bytes(plaintext.len() as u64));
    group.bench_function("16k", |b| {
        b.iter(|| black_box(aead.seal(&plaintext).unwrap()))
    });
    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let aead = Aead::new(&tunnel_key("hunter2"));
    let sealed = aead.seal(&vec![0u8; 16 * 1024]).unwrap();

    let mut group = c.benchmark_group("aead_open");
    group.throughput(Throughput::Bytes(sealed.len() as u64));
    group.bench_function("16k", |b| {
        b.iter(|| black_box(aead.open(&sealed).unwrap()))
    });
    group.finish();
}

fn bench_chunk_packet(c: &mut Criterion) {
    let aead = Aead::new(&tunnel_key("hunter2"));
    let sealed = aead.seal(&vec![0u8; 16 * 1024]).unwrap();

    let mut group = c.benchmark_group("chunk_packet");
    group.throughput(Throughput::Bytes(sealed.len() as u64));
    group.bench_function("assemble_16k", |b| {
        b.iter(|| {
            let payload = disguise::chunk_data(black_box(42), black_box(-17), &sealed);
            black_box(frame(0x25, &payload))
        })
    });
    group.finish();
}

fn bench_packed_heights(c: &mut Criterion) {
    c.bench_function("packed_heights", |b| {
        b.iter(|| black_box(disguise::packed_heights(black_box(64))))
    });
}

criterion_group!(
    benches,
    bench_var_int,
    bench_seal,
    bench_open,
    bench_chunk_packet,
    bench_packed_heights
);
criterion_main!(benches);
