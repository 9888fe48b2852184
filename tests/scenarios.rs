use std::fmt::Write as _;
use std::io::Write;

use ipv4_distinct_counter::config::{Config, Strategy};
use ipv4_distinct_counter::counter::{count_distinct, Phase};
use ipv4_distinct_counter::error::Error;
use ipv4_distinct_counter::parse::format_ipv4;
use ipv4_distinct_counter::scanner::ParsePolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::{NamedTempFile, TempDir};
use test_case::test_case;

struct Fixture {
    input: NamedTempFile,
    dir: TempDir,
}

impl Fixture {
    fn new(content: &str) -> Self {
        let mut input = NamedTempFile::new().unwrap();
        input.write_all(content.as_bytes()).unwrap();
        input.flush().unwrap();
        Self {
            input,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn config(&self, strategy: Strategy, workers: usize) -> Config {
        Config::new(self.input.path())
            .with_workers(workers)
            .with_strategy(strategy)
            .with_bitmap_path(self.dir.path().join("bitmap.dat"))
    }

    fn count(&self, strategy: Strategy, workers: usize) -> u64 {
        count_distinct(self.config(strategy, workers)).unwrap().count
    }
}

fn lines<I: IntoIterator<Item = u32>>(ips: I) -> String {
    ips.into_iter().fold(String::new(), |mut out, ip| {
        writeln!(out, "{}", format_ipv4(ip)).unwrap();
        out
    })
}

#[test_case(Strategy::ExactMemory)]
#[test_case(Strategy::ExactDisk)]
fn test_five_lines_three_distinct(strategy: Strategy) {
    let fixture = Fixture::new("1.1.1.1\n1.1.1.1\n2.2.2.2\n3.3.3.3\n2.2.2.2\n");
    assert_eq!(fixture.count(strategy, 2), 3);
}

#[test_case(Strategy::ExactMemory)]
#[test_case(Strategy::ExactDisk)]
fn test_two_thousand_sequential_exact(strategy: Strategy) {
    let fixture = Fixture::new(&lines(1..=2000));
    assert_eq!(fixture.count(strategy, 4), 2000);
}

#[test]
fn test_two_thousand_sequential_hll() {
    let fixture = Fixture::new(&lines(1..=2000));
    let estimate = fixture.count(Strategy::ApproximateHll, 4) as f64;
    assert!((estimate - 2000.0).abs() <= 200.0, "estimate {estimate}");
}

#[test_case(Strategy::ExactMemory)]
#[test_case(Strategy::ExactDisk)]
#[test_case(Strategy::ApproximateHll)]
fn test_repeated_broadcast_address(strategy: Strategy) {
    let fixture = Fixture::new(&"255.255.255.255\n".repeat(10_000));
    assert_eq!(fixture.count(strategy, 10), 1);
}

#[test]
fn test_malformed_line_skipped_by_default() {
    let fixture = Fixture::new("1.1.1.1\nnot.an.ip\n2.2.2.2\n1.1.1.1\n");
    let report = count_distinct(fixture.config(Strategy::ExactMemory, 2)).unwrap();
    assert_eq!(report.count, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.recorded, 3);
}

#[test]
fn test_malformed_line_aborts_strict_run() {
    let fixture = Fixture::new("1.1.1.1\nnot.an.ip\n2.2.2.2\n1.1.1.1\n");
    let config = fixture
        .config(Strategy::ExactDisk, 2)
        .with_parse_policy(ParsePolicy::Strict);
    match count_distinct(config) {
        Err(Error::Phase { phase, source }) => {
            assert_eq!(phase, Phase::Ingesting);
            assert!(matches!(*source, Error::Malformed { .. }));
        }
        other => panic!("expected strict failure, got {other:?}"),
    }
}

#[test]
fn test_worker_count_does_not_change_exact_count() {
    let mut rng = StdRng::seed_from_u64(5);
    let content = lines((0..20_000).map(|_| rng.gen_range(0..5_000u32) << 12));
    let fixture = Fixture::new(&content);
    let single = fixture.count(Strategy::ExactMemory, 1);
    assert_eq!(fixture.count(Strategy::ExactMemory, 10), single);
    assert_eq!(fixture.count(Strategy::ExactDisk, 10), single);
    assert_eq!(fixture.count(Strategy::ExactDisk, 1), single);
}

#[test]
fn test_exact_strategies_agree_with_hash_set() {
    let mut rng = StdRng::seed_from_u64(11);
    let ips: Vec<u32> = (0..50_000).map(|_| rng.gen_range(0..30_000u32) * 7919).collect();
    let expected = ips.iter().collect::<std::collections::HashSet<_>>().len() as u64;
    let fixture = Fixture::new(&lines(ips));
    assert_eq!(fixture.count(Strategy::ExactMemory, 3), expected);
    assert_eq!(fixture.count(Strategy::ExactDisk, 3), expected);
}

#[test]
fn test_hll_within_standard_error_of_exact() {
    let mut rng = StdRng::seed_from_u64(23);
    let content = lines((0..400_000).map(|_| rng.gen::<u32>()));
    let fixture = Fixture::new(&content);
    let exact = fixture.count(Strategy::ExactMemory, 8) as f64;
    let estimate = fixture.count(Strategy::ApproximateHll, 8) as f64;
    let standard_error = 1.04 / (32768f64).sqrt();
    assert!(
        (estimate - exact).abs() / exact < 4.0 * standard_error,
        "estimate {estimate}, exact {exact}"
    );
}

#[test]
fn test_file_without_trailing_newline() {
    let fixture = Fixture::new("10.0.0.1\n10.0.0.2\n10.0.0.3");
    for workers in 1..=6 {
        assert_eq!(fixture.count(Strategy::ExactMemory, workers), 3);
    }
}

#[test]
fn test_empty_file_counts_zero() {
    let fixture = Fixture::new("");
    assert_eq!(fixture.count(Strategy::ExactMemory, 4), 0);
    assert_eq!(fixture.count(Strategy::ApproximateHll, 4), 0);
}

#[test]
fn test_more_workers_than_lines() {
    let fixture = Fixture::new("1.2.3.4\n5.6.7.8\n");
    assert_eq!(fixture.count(Strategy::ExactMemory, 64), 2);
}
