//! ## Disk-backed bitmap
//! The same `2^32`-bit address bitmap as [`crate::bitmap::MemoryBitmap`], stored in a flat
//! file of exactly `2^29` bytes that is recreated on every run.
//!
//! Updating one bit on disk is a read-modify-write of the byte holding it. To keep two writers
//! from ever touching the same byte, the address space is split into owner partitions aligned
//! to whole pages. Each partition keeps its own file handle and a buffer of pending addresses
//! behind one mutex. A full buffer is sorted, de-duplicated and merged into the file page by
//! page while that partition's lock is held. Recording threads only contend on the mutex of the
//! partition an address falls into.

use std::fmt::{Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::bitmap::{ADDRESS_SPACE, BITMAP_BYTES};
use crate::counter::Phase;
use crate::error::{Error, Result};
use crate::planner::ByteRange;
use crate::reducer::{fork_join, partition, sum_partitions};
use crate::sink::SinkTrait;

/// Unit of read-modify-write against the bitmap file.
const PAGE_SIZE: u64 = 4096;
/// Addresses covered by one page.
const PAGE_BITS: u64 = PAGE_SIZE * 8;
/// Pending addresses per partition that trigger a merge into the file.
pub const FLUSH_THRESHOLD: usize = 1 << 16;
/// Upper bound on address partitions, each holding one open file handle. Also bounds the
/// number of concurrent readers during reduction.
pub const MAX_OWNERS: usize = 64;
/// Read buffer used when streaming the bitmap during reduction.
const STREAM_BUFFER_SIZE: usize = 1 << 20;

struct Partition {
    file: File,
    pending: Vec<u32>,
}

impl Partition {
    /// Merge pending addresses into the file.
    fn flush(&mut self, path: &Path) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let Partition { file, pending } = self;
        pending.sort_unstable();
        pending.dedup();

        let mut page = [0u8; PAGE_SIZE as usize];
        let mut i = 0;
        while i < pending.len() {
            let page_no = u64::from(pending[i]) / PAGE_BITS;
            let offset = page_no * PAGE_SIZE;
            let read_err = |source| Error::BitmapRead {
                path: path.to_path_buf(),
                offset,
                source,
            };
            let write_err = |source| Error::Write {
                path: path.to_path_buf(),
                offset,
                source,
            };

            file.seek(SeekFrom::Start(offset)).map_err(read_err)?;
            file.read_exact(&mut page).map_err(read_err)?;
            while i < pending.len() && u64::from(pending[i]) / PAGE_BITS == page_no {
                let bit = u64::from(pending[i]) % PAGE_BITS;
                page[(bit / 8) as usize] |= 1 << (bit % 8);
                i += 1;
            }
            file.seek(SeekFrom::Start(offset)).map_err(write_err)?;
            file.write_all(&page).map_err(write_err)?;
        }
        pending.clear();
        Ok(())
    }
}

pub struct DiskBitmap {
    path: PathBuf,
    /// Addresses owned by each partition, a multiple of `PAGE_BITS`.
    span: u64,
    partitions: Box<[Mutex<Partition>]>,
}

impl DiskBitmap {
    /// (Re)create the bitmap file at `path`, zeroed, with `owners` address partitions
    /// (at most [`MAX_OWNERS`]).
    pub fn create(path: &Path, owners: usize) -> Result<Self> {
        let owners = owners.clamp(1, MAX_OWNERS);
        let open_err = |source| Error::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(open_err)?;
        file.set_len(BITMAP_BYTES).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            offset: 0,
            source,
        })?;

        let pages = BITMAP_BYTES / PAGE_SIZE;
        let span = pages.div_ceil(owners as u64) * PAGE_BITS;
        let count = ADDRESS_SPACE.div_ceil(span) as usize;
        let partitions = (0..count)
            .map(|_| {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(open_err)?;
                Ok(Mutex::new(Partition {
                    file,
                    pending: Vec::new(),
                }))
            })
            .collect::<Result<Vec<_>>>()?
            .into_boxed_slice();

        debug!(path = %path.display(), partitions = count, "created disk bitmap");
        Ok(Self {
            path: path.to_path_buf(),
            span,
            partitions,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of address partitions.
    pub fn owners(&self) -> usize {
        self.partitions.len()
    }

    /// Return whether `ip` was recorded. Merges the owning partition first.
    pub fn contains(&self, ip: u32) -> Result<bool> {
        let mut partition = self.lock(self.owner_of(ip));
        partition.flush(&self.path)?;
        let offset = u64::from(ip) / 8;
        let io_err = |source| Error::BitmapRead {
            path: self.path.clone(),
            offset,
            source,
        };
        let mut byte = [0u8; 1];
        partition
            .file
            .seek(SeekFrom::Start(offset))
            .map_err(io_err)?;
        partition.file.read_exact(&mut byte).map_err(io_err)?;
        Ok(byte[0] & (1 << (ip % 8)) != 0)
    }

    #[inline]
    fn owner_of(&self, ip: u32) -> usize {
        (u64::from(ip) / self.span) as usize
    }

    #[inline]
    fn lock(&self, owner: usize) -> MutexGuard<'_, Partition> {
        // a poisoned partition only holds plain buffers, keep using it
        self.partitions[owner]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Count set bits in bitmap bytes `range` with a dedicated sequential reader.
    fn count_bytes(&self, worker: usize, range: std::ops::Range<u64>) -> Result<u64> {
        let mut file = File::open(&self.path).map_err(|source| Error::Open {
            path: self.path.clone(),
            source,
        })?;
        let byte_range = ByteRange::new(range.start, range.end);
        let read_err = |consumed, source| Error::Read {
            worker,
            range: byte_range,
            consumed,
            source,
        };
        file.seek(SeekFrom::Start(range.start))
            .map_err(|source| read_err(0, source))?;

        let mut reader = file.take(byte_range.len());
        let mut buf = vec![0u8; STREAM_BUFFER_SIZE];
        let mut consumed = 0u64;
        let mut ones = 0u64;
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|source| read_err(consumed, source))?;
            if n == 0 {
                break;
            }
            consumed += n as u64;
            ones += buf[..n]
                .iter()
                .map(|byte| u64::from(byte.count_ones()))
                .sum::<u64>();
        }
        if consumed != byte_range.len() {
            return Err(read_err(
                consumed,
                std::io::ErrorKind::UnexpectedEof.into(),
            ));
        }
        Ok(ones)
    }
}

impl SinkTrait for DiskBitmap {
    #[inline]
    fn record(&self, ip: u32) -> Result<()> {
        let mut partition = self.lock(self.owner_of(ip));
        partition.pending.push(ip);
        if partition.pending.len() >= FLUSH_THRESHOLD {
            partition.flush(&self.path)?;
        }
        Ok(())
    }

    /// Merge every partition's pending addresses, one thread per partition.
    fn finish(&self) -> Result<()> {
        let owners = self.owners();
        fork_join(Phase::Barrier, partition(owners as u64, owners), |_, range| {
            for owner in range {
                self.lock(owner as usize).flush(&self.path)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Stream the file in up to `workers` contiguous byte slices and sum their popcounts.
    fn reduce(&self, workers: usize) -> Result<u64> {
        let readers = workers.clamp(1, MAX_OWNERS);
        sum_partitions(BITMAP_BYTES, readers, |worker, range| {
            self.count_bytes(worker, range)
        })
    }

    /// Upper bound of the in-memory footprint: every partition with a full buffer.
    fn size_of(&self) -> usize {
        size_of::<Self>()
            + self.owners() * (size_of::<Mutex<Partition>>() + FLUSH_THRESHOLD * size_of::<u32>())
    }
}

impl Debug for DiskBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DiskBitmap {{ path: {}, owners: {}, {} }}",
            self.path.display(),
            self.owners(),
            SinkTrait::to_string(self)
        )
    }
}
