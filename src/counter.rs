//! Distinct counter drives a run through its phases:
//!
//! `Planning -> Ingesting -> Barrier -> Reducing -> Done`
//!
//! - Planning: split the input into line-aligned byte ranges, one per worker.
//! - Ingesting: one scoped thread per range scans it with its own file handle and records every
//!   parsed address into the single shared [`Sink`].
//! - Barrier: all ingest threads are joined, then the sink merges whatever it still buffers.
//! - Reducing: a second fork-join round over the address space (or registers) turns the shared
//!   structure into one count.
//!
//! The shared structure is never read before every ingest thread has been joined.
//!
//! # Examples
//!
//! ```no_run
//! use ipv4_distinct_counter::config::{Config, Strategy};
//! use ipv4_distinct_counter::counter::DistinctCounter;
//!
//! let config = Config::new("ip_addresses")
//!     .with_workers(10)
//!     .with_strategy(Strategy::ApproximateHll);
//! let report = DistinctCounter::new(config)?.run()?;
//! println!("{}", report.count);
//! # Ok::<(), ipv4_distinct_counter::error::Error>(())
//! ```

use std::fmt::{Display, Formatter};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{Config, Strategy};
use crate::error::{Error, Result};
use crate::planner::{plan_file, ByteRange};
use crate::scanner::{scan, CancellationToken, ScanStats};
use crate::sink::{Sink, SinkTrait};

/// Phase of a counting run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    Planning,
    Ingesting,
    Barrier,
    Reducing,
    Done,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Planning => "planning",
            Phase::Ingesting => "ingesting",
            Phase::Barrier => "barrier",
            Phase::Reducing => "reducing",
            Phase::Done => "done",
        })
    }
}

/// Result of a counting run.
#[derive(Clone, Debug, PartialEq)]
pub struct CountReport {
    /// Exact or estimated number of distinct addresses.
    pub count: u64,
    pub strategy: Strategy,
    pub workers: usize,
    /// Non-blank lines read.
    pub lines: u64,
    /// Lines recorded as addresses.
    pub recorded: u64,
    /// Malformed lines skipped.
    pub skipped: u64,
    pub elapsed_ingest: Duration,
    pub elapsed_reduce: Duration,
}

impl Display for CountReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} distinct addresses ({}, {} workers, {} lines",
            self.count, self.strategy, self.workers, self.lines
        )?;
        if self.skipped > 0 {
            write!(f, ", {} records skipped", self.skipped)?;
        }
        f.write_str(")")
    }
}

pub struct DistinctCounter {
    config: Config,
    sink: Sink,
    phase: Phase,
}

impl DistinctCounter {
    /// Validate `config` and create the shared sink.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let sink = Sink::new(&config)?;
        Ok(Self {
            config,
            sink,
            phase: Phase::Planning,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Run every phase and return the count.
    pub fn run(mut self) -> Result<CountReport> {
        let workers = self.config.workers;

        let ranges = plan_file(&self.config.input_path, workers)
            .map_err(|err| err.in_phase(Phase::Planning))?;
        self.enter(Phase::Ingesting);
        let ingest_start = Instant::now();
        let stats = self.ingest(&ranges).map_err(|err| err.in_phase(Phase::Ingesting))?;

        self.enter(Phase::Barrier);
        self.sink
            .finish()
            .map_err(|err| err.in_phase(Phase::Barrier))?;
        let elapsed_ingest = ingest_start.elapsed();
        info!(elapsed = ?elapsed_ingest, "ingest complete");

        self.enter(Phase::Reducing);
        let reduce_start = Instant::now();
        let count = self
            .sink
            .reduce(workers)
            .map_err(|err| err.in_phase(Phase::Reducing))?;
        let elapsed_reduce = reduce_start.elapsed();
        self.enter(Phase::Done);

        let report = CountReport {
            count,
            strategy: self.config.strategy,
            workers,
            lines: stats.iter().map(|s| s.lines).sum(),
            recorded: stats.iter().map(|s| s.recorded).sum(),
            skipped: stats.iter().map(|s| s.skipped).sum(),
            elapsed_ingest,
            elapsed_reduce,
        };
        if report.skipped > 0 {
            warn!(skipped = report.skipped, "malformed records skipped");
        }
        info!(count, elapsed = ?elapsed_reduce, "reduction complete");
        Ok(report)
    }

    fn enter(&mut self, phase: Phase) {
        debug_assert!(phase > self.phase, "phases only move forward");
        info!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    /// Scan every range on its own thread and wait for all of them.
    fn ingest(&self, ranges: &[ByteRange]) -> Result<Vec<ScanStats>> {
        let token = CancellationToken::new();
        let path = self.config.input_path.as_path();
        let policy = self.config.parse_policy;
        let sink = &self.sink;

        let results: Vec<Result<ScanStats>> = thread::scope(|s| {
            let handles: Vec<_> = ranges
                .iter()
                .enumerate()
                .map(|(worker, &range)| {
                    let token = token.clone();
                    s.spawn(move || {
                        let _guard = token.cancel_on_panic();
                        let result = scan(path, worker, range, sink, policy, &token);
                        if result.as_ref().is_err_and(|err| !err.is_cancellation()) {
                            token.cancel();
                        }
                        result
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or(Err(Error::WorkerPanicked {
                        phase: Phase::Ingesting,
                    }))
                })
                .collect()
        });

        collect_scans(results)
    }
}

/// Stats of every worker, or the first failure that is not a cancellation.
///
/// Cancellations are only reported when nothing else failed.
fn collect_scans(results: Vec<Result<ScanStats>>) -> Result<Vec<ScanStats>> {
    let mut stats = Vec::with_capacity(results.len());
    let mut cancelled = None;
    for result in results {
        match result {
            Ok(s) => stats.push(s),
            Err(err) if err.is_cancellation() => {
                cancelled.get_or_insert(err);
            }
            Err(err) => return Err(err),
        }
    }
    match cancelled {
        Some(err) => Err(err),
        None => Ok(stats),
    }
}

/// Count distinct addresses with `config`.
pub fn count_distinct(config: Config) -> Result<CountReport> {
    DistinctCounter::new(config)?.run()
}
