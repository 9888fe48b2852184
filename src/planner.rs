//! Splits an input file into line-aligned byte ranges, one per ingest worker.
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

/// Half-open `[start, end)` byte offsets into the input file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[inline]
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Display for ByteRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Plan `workers` contiguous ranges covering `[0, file_size)` of `reader`.
///
/// Ranges start out equally sized with the last one absorbing the remainder. Every inner
/// boundary is then moved forward to just past the first `\n` at or after it, so no line is
/// split between two workers. A nominal boundary equal to the previous one is still shifted
/// past the next line. One that falls before the previous boundary collapses onto it and
/// leaves an empty range in between.
pub fn plan<R: Read + Seek>(
    reader: &mut R,
    file_size: u64,
    workers: usize,
) -> io::Result<Vec<ByteRange>> {
    let workers = workers.max(1);
    let chunk_len = file_size / workers as u64;

    let mut boundaries = Vec::with_capacity(workers + 1);
    boundaries.push(0);
    for i in 1..workers {
        let nominal = i as u64 * chunk_len;
        let previous = boundaries[i - 1];
        let boundary = if nominal < previous {
            previous
        } else {
            align_to_line(reader, nominal, file_size)?
        };
        boundaries.push(boundary);
    }
    boundaries.push(file_size);

    Ok(boundaries
        .windows(2)
        .map(|w| ByteRange::new(w[0], w[1]))
        .collect())
}

/// Open `path` and plan its ranges.
pub fn plan_file(path: &Path, workers: usize) -> Result<Vec<ByteRange>> {
    let open_err = |source| Error::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(open_err)?;
    let file_size = file.metadata().map_err(open_err)?.len();
    plan(&mut file, file_size, workers).map_err(|source| Error::Read {
        worker: 0,
        range: ByteRange::new(0, file_size),
        consumed: 0,
        source,
    })
}

/// Offset just past the first newline at or after `offset`, or `file_size` if there is none.
fn align_to_line<R: Read + Seek>(reader: &mut R, offset: u64, file_size: u64) -> io::Result<u64> {
    if offset >= file_size {
        return Ok(file_size);
    }
    reader.seek(SeekFrom::Start(offset))?;
    let mut skipped = Vec::new();
    let shift = BufReader::new(reader).read_until(b'\n', &mut skipped)?;
    Ok((offset + shift as u64).min(file_size))
}
