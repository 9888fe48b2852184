use std::io::{BufWriter, Write};

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};
use ipv4_distinct_counter::bitmap::MemoryBitmap;
use ipv4_distinct_counter::config::{default_workers, Config, Strategy};
use ipv4_distinct_counter::counter::count_distinct;
use ipv4_distinct_counter::hyperloglog::{HyperLogLog, DEFAULT_PRECISION};
use ipv4_distinct_counter::parse::{format_ipv4, parse_ipv4};
use ipv4_distinct_counter::sink::SinkTrait;
use pprof::criterion::{Output, PProfProfiler};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

/// Number of lines in the generated input, overridable with environment variable `N`.
const DEFAULT_LINES: usize = 1 << 20;

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .with_profiler(PProfProfiler::new(100, Output::Protobuf));
    targets = benchmark
}
criterion_main!(benches);

fn benchmark(c: &mut Criterion) {
    let lines = std::env::var("N")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LINES);
    let mut rng = StdRng::seed_from_u64(1);
    let ips: Vec<u32> = (0..lines).map(|_| rng.gen()).collect();

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(ips.len() as u64));
    let formatted: Vec<String> = ips.iter().map(|&ip| format_ipv4(ip)).collect();
    group.bench_function("parse_ipv4", |b| {
        b.iter(|| {
            for line in &formatted {
                black_box(parse_ipv4(line.as_bytes()));
            }
        })
    });
    group.finish();

    let mut group = c.benchmark_group("record");
    group.throughput(Throughput::Elements(ips.len() as u64));
    bench_record(&mut group, "memory", &ips, MemoryBitmap::new);
    bench_record(&mut group, "hll", &ips, || {
        HyperLogLog::new(DEFAULT_PRECISION).unwrap()
    });
    group.finish();

    let input = write_input(&ips);
    let dir = tempfile::tempdir().unwrap();
    let workers = default_workers();
    let mut group = c.benchmark_group("count_distinct");
    group.throughput(Throughput::Elements(ips.len() as u64));
    for strategy in Strategy::ALL {
        group.bench_with_input(
            BenchmarkId::new(strategy.as_str(), workers),
            &strategy,
            |b, &strategy| {
                b.iter(|| {
                    let config = Config::new(input.path())
                        .with_workers(workers)
                        .with_strategy(strategy)
                        .with_bitmap_path(dir.path().join("bitmap.dat"));
                    black_box(count_distinct(config).unwrap().count)
                })
            },
        );
    }
    group.finish();
}

fn bench_record<S: SinkTrait>(
    group: &mut BenchmarkGroup<WallTime>,
    name: &str,
    ips: &[u32],
    create: impl Fn() -> S,
) {
    let sink = create();
    group.bench_function(name, |b| {
        b.iter(|| {
            for &ip in ips {
                sink.record(black_box(ip)).unwrap();
            }
        })
    });
}

fn write_input(ips: &[u32]) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let mut writer = BufWriter::new(file.reopen().unwrap());
    for &ip in ips {
        writeln!(writer, "{}", format_ipv4(ip)).unwrap();
    }
    writer.flush().unwrap();
    file
}
