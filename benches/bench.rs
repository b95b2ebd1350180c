//! Criterion benchmarks for the Pilum storage core.
//!
//! Covers:
//! - Numeric term encoding
//! - Buffered output and input over the memory directory
//! - FST construction and exact-match lookup
//! - Skip list seeking

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pilum::lexical::fst::FstBuilder;
use pilum::lexical::skip_list::{SkipConfig, SkipReader, SkipWriter};
use pilum::lexical::{DocId, doc_limits};
use pilum::storage::Directory;
use pilum::storage::data_io::{DataInput, DataOutput, IndexInput};
use pilum::storage::memory::MemoryDirectory;
use pilum::util::numeric::{MAX_ENCODED_SIZE, encode, numeric_terms};
use std::hint::black_box;

/// Generate sorted, unique terms for dictionary benchmarks.
fn generate_terms(count: usize) -> Vec<Vec<u8>> {
    let syllables = ["ka", "ri", "to", "sa", "mu", "ne", "lo", "pe"];
    let mut terms: Vec<Vec<u8>> = (0..count)
        .map(|i| {
            let mut term = Vec::new();
            let mut n = i;
            loop {
                term.extend_from_slice(syllables[n % syllables.len()].as_bytes());
                n /= syllables.len();
                if n == 0 {
                    break;
                }
            }
            term.extend_from_slice(format!("{}", i % 97).as_bytes());
            term
        })
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn bench_numeric(c: &mut Criterion) {
    let mut group = c.benchmark_group("numeric");
    let values: Vec<i64> = (0..1000).map(|i| i * 7_919 - 3_000_000).collect();
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("encode_i64", |b| {
        let mut out = [0u8; MAX_ENCODED_SIZE];
        b.iter(|| {
            for &value in &values {
                black_box(encode(black_box(value), 0, &mut out));
            }
        })
    });

    group.bench_function("precision_terms_i64", |b| {
        b.iter(|| {
            for &value in &values {
                for term in numeric_terms(black_box(value), 16) {
                    black_box(term);
                }
            }
        })
    });

    group.finish();
}

fn bench_buffered_io(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered_io");
    let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("write_vints", |b| {
        let dir = MemoryDirectory::default();
        b.iter(|| {
            let mut out = dir.create_output("bench").unwrap();
            for i in 0..100_000u32 {
                out.write_vint(black_box(i)).unwrap();
            }
            out.close().unwrap();
        })
    });

    let dir = MemoryDirectory::default();
    let mut out = dir.create_output("data").unwrap();
    out.write_bytes(&data).unwrap();
    out.close().unwrap();

    for chunk in [64usize, 4096] {
        group.bench_with_input(BenchmarkId::new("read_chunks", chunk), &chunk, |b, &chunk| {
            let mut buf = vec![0u8; chunk];
            b.iter(|| {
                let mut input = dir.open_input("data").unwrap();
                while !input.eof() {
                    black_box(input.read_bytes(&mut buf).unwrap());
                }
            })
        });
    }

    group.bench_function("checksum", |b| {
        b.iter(|| {
            let mut input = dir.open_input("data").unwrap();
            black_box(input.checksum(data.len() as u64).unwrap())
        })
    });

    group.finish();
}

fn bench_fst(c: &mut Criterion) {
    let mut group = c.benchmark_group("fst");
    let terms = generate_terms(20_000);
    group.throughput(Throughput::Elements(terms.len() as u64));

    group.bench_function("build", |b| {
        b.iter(|| {
            let mut builder = FstBuilder::new();
            for (i, term) in terms.iter().enumerate() {
                builder.insert(term, &(i as u32).to_be_bytes());
            }
            black_box(builder.finish())
        })
    });

    let mut builder = FstBuilder::new();
    for (i, term) in terms.iter().enumerate() {
        builder.insert(term, &(i as u32).to_be_bytes());
    }
    let (fst, _) = builder.finish();

    group.bench_function("get", |b| {
        b.iter(|| {
            for term in &terms {
                black_box(fst.get(black_box(term)));
            }
        })
    });

    group.bench_function("stream", |b| b.iter(|| black_box(fst.stream().count())));

    group.finish();
}

fn read_key(_level: usize, input: &mut dyn IndexInput) -> pilum::error::Result<DocId> {
    if input.eof() {
        return Ok(doc_limits::eof());
    }
    input.read_vint()
}

fn bench_skip_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("skip_list");
    let config = SkipConfig::default();
    let count = 1_000_000u64;

    let dir = MemoryDirectory::default();
    let mut writer = SkipWriter::new(config).unwrap();
    writer.prepare(config.max_levels, count);
    for i in (config.skip_0..=count).step_by(config.skip_0 as usize) {
        writer
            .skip(i, |_, out: &mut dyn DataOutput| out.write_vint((i - 1) as u32))
            .unwrap();
    }
    let mut out = dir.create_output("skip").unwrap();
    writer.flush(&mut *out).unwrap();
    out.close().unwrap();

    let targets: Vec<DocId> = (0..1000).map(|i| i * 997).collect();
    group.throughput(Throughput::Elements(targets.len() as u64));

    group.bench_function("seek_forward", |b| {
        let mut input = dir.open_input("skip").unwrap();
        let mut reader = SkipReader::new(config).unwrap();
        reader.prepare(&mut *input).unwrap();
        b.iter(|| {
            reader.reset().unwrap();
            for &target in &targets {
                black_box(reader.seek(target, read_key).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_numeric,
    bench_buffered_io,
    bench_fst,
    bench_skip_list
);
criterion_main!(benches);
