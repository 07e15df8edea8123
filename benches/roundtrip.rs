//! Criterion benchmark for the DEFLATE<->puff transcode, in the shape of
//! the teacher crate's decode benchmark: compress a realistic corpus file
//! with `flate2`, then measure puffing and huffing it back.
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

fn compress(data: &[u8], level: Compression) -> Vec<u8>
{
    let mut encoder = DeflateEncoder::new(Vec::new(), level);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn corpus() -> Vec<(&'static str, Vec<u8>)>
{
    let text = "the quick brown fox jumps over the lazy dog. ".repeat(4096).into_bytes();
    vec![("text", text), ("repeated", vec![b'a'; 1 << 16])]
}

fn bench_puff(c: &mut Criterion)
{
    let mut group = c.benchmark_group("puff");

    for (name, data) in corpus()
    {
        let deflated = compress(&data, Compression::default());
        group.throughput(Throughput::Bytes(deflated.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &deflated, |b, deflated| {
            let mut out = vec![0_u8; deflated.len() * 4 + 1024];
            b.iter(|| puffin::puff(deflated, &mut out).unwrap());
        });
    }

    group.finish();
}

fn bench_huff(c: &mut Criterion)
{
    let mut group = c.benchmark_group("huff");

    for (name, data) in corpus()
    {
        let deflated = compress(&data, Compression::default());
        let puffed = puffin::puff_to_vec(&deflated).unwrap();
        group.throughput(Throughput::Bytes(puffed.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &puffed, |b, puffed| {
            let mut out = vec![0_u8; deflated.len() + 1024];
            b.iter(|| puffin::huff(puffed, &mut out).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_puff, bench_huff);
criterion_main!(benches);
