//! Run configuration, constructed once and handed to every component.
use std::fmt::{Display, Formatter};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;

use crate::error::{Error, Result};
use crate::hyperloglog::{DEFAULT_PRECISION, MAX_PRECISION, MIN_PRECISION};
use crate::scanner::ParsePolicy;

/// Counting strategy selected for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "with_serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Strategy {
    /// Exact bitmap over the whole address space, held in memory.
    #[default]
    ExactMemory,
    /// Exact bitmap stored in a 512 MiB file.
    ExactDisk,
    /// HyperLogLog estimate.
    ApproximateHll,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::ExactMemory,
        Strategy::ExactDisk,
        Strategy::ApproximateHll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ExactMemory => "exact-memory",
            Strategy::ExactDisk => "exact-disk",
            Strategy::ApproximateHll => "approximate-hll",
        }
    }

    pub fn is_exact(&self) -> bool {
        !matches!(self, Strategy::ApproximateHll)
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| Error::UnknownStrategy(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pub input_path: PathBuf,
    pub workers: usize,
    pub strategy: Strategy,
    /// Backing file for [`Strategy::ExactDisk`], recreated on every run.
    pub bitmap_path: Option<PathBuf>,
    /// HyperLogLog precision `b`, the register count is `2^b`.
    pub hll_precision: u8,
    pub parse_policy: ParsePolicy,
}

impl Config {
    /// Configuration with defaults for everything but the input path.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            workers: default_workers(),
            strategy: Strategy::default(),
            bitmap_path: None,
            hll_precision: DEFAULT_PRECISION,
            parse_policy: ParsePolicy::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_bitmap_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bitmap_path = Some(path.into());
        self
    }

    pub fn with_hll_precision(mut self, precision: u8) -> Self {
        self.hll_precision = precision;
        self
    }

    pub fn with_parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.parse_policy = policy;
        self
    }

    /// Check every option before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidWorkerCount(self.workers));
        }
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.hll_precision) {
            return Err(Error::InvalidPrecision {
                precision: self.hll_precision,
                min: MIN_PRECISION,
                max: MAX_PRECISION,
            });
        }
        if self.strategy == Strategy::ExactDisk && self.bitmap_path.is_none() {
            return Err(Error::MissingBitmapPath);
        }
        if self.input_path.as_os_str().is_empty() || self.input_path.is_dir() {
            return Err(Error::InvalidInputPath(self.input_path.clone()));
        }
        Ok(())
    }

    /// Path of the disk bitmap, if the strategy uses one.
    pub fn bitmap_path(&self) -> Option<&Path> {
        self.bitmap_path.as_deref()
    }
}

/// One worker per unit of available parallelism.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
