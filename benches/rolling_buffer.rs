//! Benchmark for rolling history appends at dashboard-sized capacities

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fleetsync::history::{HistorySample, RollingBuffer};

fn sample(i: usize) -> HistorySample {
    HistorySample::new(Utc::now())
        .with_field("download", i as f64)
        .with_field("upload", (i / 2) as f64)
}

fn filled(capacity: usize) -> RollingBuffer<HistorySample> {
    (0..capacity).fold(RollingBuffer::new(capacity).unwrap(), |buf, i| {
        buf.pushed(sample(i))
    })
}

fn bench_push_full_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_buffer_push");
    for capacity in [60usize, 300, 3600] {
        let buffer = filled(capacity);
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &buffer, |b, buf| {
            b.iter(|| black_box(buf.push(sample(capacity))));
        });
    }
    group.finish();
}

fn bench_series_extraction(c: &mut Criterion) {
    let buffer = filled(300);
    c.bench_function("rolling_buffer_series_300", |b| {
        b.iter(|| black_box(buffer.series(black_box("download"))));
    });
}

criterion_group!(benches, bench_push_full_buffer, bench_series_extraction);
criterion_main!(benches);
