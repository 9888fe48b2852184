use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use ipv4_distinct_counter::config::{default_workers, Config, Strategy};
use ipv4_distinct_counter::counter::count_distinct;
use ipv4_distinct_counter::hyperloglog::DEFAULT_PRECISION;
use ipv4_distinct_counter::logging::setup_logging;
use ipv4_distinct_counter::scanner::ParsePolicy;

/// Count distinct IPv4 addresses in a newline-delimited file.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// File with one dotted-quad address per line.
    #[arg(short, long, env = "IPV4_COUNTER_INPUT")]
    input: PathBuf,

    /// Number of parallel workers, defaults to the available parallelism.
    #[arg(short, long, env = "IPV4_COUNTER_WORKERS")]
    workers: Option<usize>,

    /// Counting strategy: exact-memory, exact-disk or approximate-hll.
    #[arg(short, long, env = "IPV4_COUNTER_STRATEGY", default_value_t = Strategy::ExactMemory)]
    strategy: Strategy,

    /// Bitmap file for the exact-disk strategy, recreated on every run.
    #[arg(long, env = "IPV4_COUNTER_BITMAP_PATH")]
    bitmap_path: Option<PathBuf>,

    /// HyperLogLog precision, the register count is 2^precision.
    #[arg(long, env = "IPV4_COUNTER_PRECISION", default_value_t = DEFAULT_PRECISION)]
    precision: u8,

    /// Abort on the first malformed record instead of skipping it.
    #[arg(long)]
    strict: bool,

    /// Human readable logs instead of JSON.
    #[arg(long)]
    pretty_logs: bool,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config::new(self.input)
            .with_workers(self.workers.unwrap_or_else(default_workers))
            .with_strategy(self.strategy)
            .with_hll_precision(self.precision)
            .with_parse_policy(if self.strict {
                ParsePolicy::Strict
            } else {
                ParsePolicy::Skip
            });
        if let Some(path) = self.bitmap_path {
            config = config.with_bitmap_path(path);
        }
        config
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = setup_logging(args.pretty_logs) {
        eprintln!("failed to set up logging: {err}");
    }

    let config = args.into_config();
    info!(?config, "starting run");
    match count_distinct(config) {
        Ok(report) => {
            info!(
                %report,
                ingest = ?report.elapsed_ingest,
                reduce = ?report.elapsed_reduce,
                "run complete"
            );
            println!("{}", report.count);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "run failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
