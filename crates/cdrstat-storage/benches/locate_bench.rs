//! Locator and Decoder Benchmarks
//!
//! ## What We Benchmark
//!
//! ### 1. Locate (`bench_locate`)
//! - Closed-form offset computation for low and very high phone indices
//! - Cost must not grow with the phone index
//!
//! ### 2. Decode (`bench_decode_block`)
//! - Parsing one block of padded slots, as written by `StoreWriter`
//! - Different block sizes (100, 1K, 10K records)
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench -p cdrstat-storage
//! cargo bench -p cdrstat-storage --bench locate_bench decode_block
//! ```

use cdrstat_core::CallRecord;
use cdrstat_storage::{decode_block, RecordLocator, StoreLayout, StoreWriter};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn sample_record(phone: u64, n: u64) -> CallRecord {
    let start = 1_684_108_800_000 + (n as i64) * 60_000;
    CallRecord::new(phone, start, start + (n as i64 * 17) % 90, (n % 30) as f64)
}

fn bench_locate(c: &mut Criterion) {
    let locator = RecordLocator::new(StoreLayout::default());
    let mut group = c.benchmark_group("locate");

    for phone in [0u64, 1_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(phone), &phone, |b, &phone| {
            b.iter(|| locator.locate(black_box(phone)).unwrap());
        });
    }

    group.finish();
}

fn bench_decode_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_block");

    for records_per_phone in [100u64, 1_000, 10_000] {
        let layout = StoreLayout::new(records_per_phone, 96);
        let mut store = Vec::new();
        StoreWriter::new(layout)
            .write(&mut store, 2, sample_record)
            .unwrap();

        let range = RecordLocator::new(layout).locate(0).unwrap();
        let block = store[range.start as usize..range.end as usize].to_vec();

        group.throughput(Throughput::Elements(records_per_phone));
        group.bench_with_input(
            BenchmarkId::from_parameter(records_per_phone),
            &block,
            |b, block| {
                b.iter(|| decode_block(black_box(block)).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_locate, bench_decode_block);
criterion_main!(benches);
