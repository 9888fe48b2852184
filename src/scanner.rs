//! Sequential scan of one byte range, feeding every parsed address into a sink.
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::error::{Error, Result};
use crate::parse::parse_ipv4;
use crate::planner::ByteRange;
use crate::sink::SinkTrait;

/// Read buffer size of a scanning worker.
const READ_BUFFER_SIZE: usize = 1 << 20;

/// What to do with a line that is not a dotted quad.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "with_serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ParsePolicy {
    /// Skip the line and tally it.
    #[default]
    Skip,
    /// Abort the run.
    Strict,
}

/// Shared flag telling workers to stop early.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Cancel the token if the current thread unwinds while the returned guard is alive.
    pub fn cancel_on_panic(&self) -> PanicGuard<'_> {
        PanicGuard(self)
    }
}

/// See [`CancellationToken::cancel_on_panic`].
pub struct PanicGuard<'a>(&'a CancellationToken);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.cancel();
        }
    }
}

/// Outcome of scanning one range.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub worker: usize,
    pub range: ByteRange,
    pub bytes_consumed: u64,
    pub lines: u64,
    pub recorded: u64,
    pub skipped: u64,
}

/// Scan `range` of the file at `path` with a dedicated read handle.
///
/// Lines are read until at least `range.len()` bytes were consumed or the file ends.
pub fn scan<S: SinkTrait + ?Sized>(
    path: &Path,
    worker: usize,
    range: ByteRange,
    sink: &S,
    policy: ParsePolicy,
    token: &CancellationToken,
) -> Result<ScanStats> {
    let mut stats = ScanStats {
        worker,
        range,
        ..ScanStats::default()
    };
    if range.is_empty() {
        return Ok(stats);
    }
    if token.is_cancelled() {
        return Err(Error::Cancelled { worker });
    }

    let mut file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let read_err = |consumed, source| Error::Read {
        worker,
        range,
        consumed,
        source,
    };
    file.seek(SeekFrom::Start(range.start))
        .map_err(|source| read_err(0, source))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let mut line = Vec::with_capacity(64);
    while stats.bytes_consumed < range.len() {
        if token.is_cancelled() {
            return Err(Error::Cancelled { worker });
        }
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| read_err(stats.bytes_consumed, source))?;
        if n == 0 {
            break;
        }
        let offset = range.start + stats.bytes_consumed;
        stats.bytes_consumed += n as u64;

        if line.trim_ascii().is_empty() {
            continue;
        }
        stats.lines += 1;
        match parse_ipv4(&line) {
            Some(ip) => {
                sink.record(ip)?;
                stats.recorded += 1;
            }
            None if policy == ParsePolicy::Strict => {
                return Err(Error::Malformed {
                    worker,
                    offset,
                    line: String::from_utf8_lossy(line.trim_ascii()).into_owned(),
                });
            }
            None => stats.skipped += 1,
        }
    }

    debug!(
        worker,
        %range,
        lines = stats.lines,
        skipped = stats.skipped,
        "finished scanning range"
    );
    Ok(stats)
}
