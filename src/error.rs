//! Error type shared by every stage of a counting run.
use std::io;
use std::path::PathBuf;

use crate::counter::Phase;
use crate::planner::ByteRange;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("worker count must be positive, got {0}")]
    InvalidWorkerCount(usize),

    #[error("HyperLogLog precision must be in [{min}..={max}], got {precision}")]
    InvalidPrecision { precision: u8, min: u8, max: u8 },

    #[error("the exact-disk strategy requires a bitmap path")]
    MissingBitmapPath,

    #[error("input path is not a regular file: {0}")]
    InvalidInputPath(PathBuf),

    #[error("unknown strategy {0:?}, expected one of exact-memory, exact-disk, approximate-hll")]
    UnknownStrategy(String),

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("worker {worker} failed reading {range} after {consumed} bytes: {source}")]
    Read {
        worker: usize,
        range: ByteRange,
        consumed: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to read bitmap {path} at offset {offset}: {source}")]
    BitmapRead {
        path: PathBuf,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to write bitmap {path} at offset {offset}: {source}")]
    Write {
        path: PathBuf,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("worker {worker} found malformed record at byte {offset}: {line:?}")]
    Malformed {
        worker: usize,
        offset: u64,
        line: String,
    },

    #[error("worker {worker} was cancelled after a peer failed")]
    Cancelled { worker: usize },

    #[error("a worker panicked during the {phase} phase")]
    WorkerPanicked { phase: Phase },

    #[error("{phase} phase failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the run phase to an error, unless it already carries one.
    pub(crate) fn in_phase(self, phase: Phase) -> Self {
        match self {
            err @ (Error::Phase { .. } | Error::WorkerPanicked { .. }) => err,
            err => Error::Phase {
                phase,
                source: Box::new(err),
            },
        }
    }

    /// Whether the error is only a consequence of another worker failing.
    pub(crate) fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}
