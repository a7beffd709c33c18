//! Benchmarks for frame decoding
//!
//! Covers the per-frame work done between a read completing and the cache
//! being replaced:
//! - Solarman data frame decode against the Solis preset table
//! - Acknowledgement encoding
//! - Range sensor buffer accumulation across small chunks

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use sensorwire::codec::{Acknowledgement, RangeFrameDecoder, SolarmanDecoder, SolarmanFrame};
use sensorwire::presets::solis_inverter_table;
use sensorwire::test_utils::{DataFrameBuilder, range_chunks};
use std::hint::black_box;
use std::sync::Arc;

fn bench_solarman_decode(c: &mut Criterion) {
    let table = solis_inverter_table().expect("preset table is valid");
    let bytes = DataFrameBuilder::new(&table)
        .text("inverter_serial", "1803BENCH")
        .number("dc1_V", 312.4)
        .number("ac_output_W", 2750.0)
        .number("generation_total_kWh", 10234.5)
        .build(0x01);
    let frame = SolarmanFrame::parse(bytes.clone()).expect("fixture frame parses");
    let decoder = SolarmanDecoder::new(Arc::new(table)).expect("preset table is binary");

    let mut group = c.benchmark_group("solarman");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("parse_frame", |b| {
        b.iter(|| black_box(SolarmanFrame::parse(black_box(bytes.clone()))))
    });

    group.bench_function("decode_solis_frame", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&frame))))
    });

    group.bench_function("encode_ack", |b| {
        b.iter(|| black_box(Acknowledgement::for_frame(black_box(&frame), 1_600_000_000).encode()))
    });

    group.finish();
}

fn bench_range_decode(c: &mut Criterion) {
    let chunks = range_chunks(64);
    let total: usize = chunks.iter().map(|chunk| chunk.len()).sum();

    let mut group = c.benchmark_group("range_sensor");
    group.throughput(Throughput::Bytes(total as u64));

    group.bench_function("push_small_chunks", |b| {
        b.iter_batched(
            || RangeFrameDecoder::with_defaults().expect("default pattern compiles"),
            |mut decoder| {
                for chunk in &chunks {
                    let _ = black_box(decoder.push(chunk));
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_solarman_decode, bench_range_decode);
criterion_main!(benches);
