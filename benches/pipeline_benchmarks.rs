use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use powerflow::position::report::{build_position, build_report};
use powerflow::position::{PowerTrade, PowerTrades, ReportSpec};
use powerflow::prelude::*;

async fn run_chain(size: u64, stages: usize, capacity: usize, concurrency: usize) {
    let sink = CountSink::new();
    let mut builder = Pipeline::builder(CancellationToken::new()).stage(
        StageConfig::new("map").bounded(capacity).concurrency(concurrency),
        MapProcessor::new(|x: u64| black_box(x * 2)),
    );
    for i in 1..stages {
        builder = builder.stage(
            StageConfig::new(format!("pass-{}", i))
                .bounded(capacity)
                .concurrency(concurrency),
            NoOpProcessor::new(),
        );
    }
    let pipeline = builder
        .sink(StageConfig::new("count").bounded(capacity), sink.clone())
        .unwrap();

    IterSource::new(0..size).run(pipeline.entry()).await;
    pipeline.shutdown().await;
    assert_eq!(sink.ok_count() as u64, size);
}

fn bench_chain_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_length");
    let size = 1000u64;
    group.throughput(Throughput::Elements(size));

    for stages in [1, 3, 5].iter() {
        group.bench_with_input(BenchmarkId::new("stages", stages), stages, |b, &stages| {
            b.iter(|| {
                tokio::runtime::Runtime::new()
                    .unwrap()
                    .block_on(run_chain(size, stages, 4, 1))
            });
        });
    }

    group.finish();
}

fn bench_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("capacity");
    let size = 1000u64;
    group.throughput(Throughput::Elements(size));

    for capacity in [1, 4, 64].iter() {
        group.bench_with_input(
            BenchmarkId::new("bounded", capacity),
            capacity,
            |b, &capacity| {
                b.iter(|| {
                    tokio::runtime::Runtime::new()
                        .unwrap()
                        .block_on(run_chain(size, 3, capacity, 1))
                });
            },
        );
    }

    group.finish();
}

fn bench_concurrency(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrency");
    let size = 1000u64;
    group.throughput(Throughput::Elements(size));

    for workers in [1, 2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            workers,
            |b, &workers| {
                b.iter(|| {
                    tokio::runtime::Builder::new_multi_thread()
                        .enable_all()
                        .build()
                        .unwrap()
                        .block_on(run_chain(size, 3, 16, workers))
                });
            },
        );
    }

    group.finish();
}

fn bench_position_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("position_report");
    let date = chrono::NaiveDate::from_ymd_opt(2015, 5, 10).unwrap();
    let day = chrono::DateTime::parse_from_rfc3339("2015-05-10T12:05:00+01:00").unwrap();
    let spec = ReportSpec::default();

    for trades in [1, 10, 100].iter() {
        let book = PowerTrades {
            day,
            trades: (0..*trades)
                .map(|i| PowerTrade::with_volumes(date, &[f64::from(i); 24]))
                .collect(),
        };
        group.bench_with_input(BenchmarkId::new("trades", trades), &book, |b, book| {
            b.iter(|| {
                let position = build_position(black_box(book.clone())).unwrap();
                build_report(&spec, position).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_chain_length,
    bench_capacity,
    bench_concurrency,
    bench_position_report
);
criterion_main!(benches);
