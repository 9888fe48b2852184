//! ## In-memory bitmap
//! Exact membership over the whole IPv4 address space: one bit per address, `2^32` bits
//! (512 MiB) stored as `2^26` atomic 64-bit words.
//!
//! Bit `ip` lives in word `ip >> 6` at bit `ip & 63`, which on little-endian targets is byte
//! `ip / 8`, bit `ip % 8`, the same layout the disk bitmap uses.
//!
//! Bits are only ever set with `fetch_or`, so concurrent workers touching neighbouring
//! addresses never lose each other's updates.

use std::alloc::{alloc_zeroed, handle_alloc_error, Layout};
use std::fmt::{Debug, Formatter};
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::reducer::sum_partitions;
use crate::sink::SinkTrait;

/// Number of distinct IPv4 addresses.
pub const ADDRESS_SPACE: u64 = 1 << 32;
/// Size of a full address bitmap in bytes.
pub const BITMAP_BYTES: u64 = ADDRESS_SPACE / 8;
/// Number of 64-bit words in the in-memory bitmap.
const WORDS: usize = 1 << 26;

pub struct MemoryBitmap {
    words: Box<[AtomicU64]>,
}

impl MemoryBitmap {
    /// Allocate a zeroed bitmap.
    ///
    /// Memory is requested zeroed from the allocator so untouched pages are never committed.
    pub fn new() -> Self {
        let layout = Layout::new::<[AtomicU64; WORDS]>();
        // SAFETY: `layout` has a non-zero size, and an all-zero bit pattern is a valid
        // `AtomicU64`. The box takes ownership of an allocation made with the layout of a
        // `[AtomicU64]` slice of length `WORDS`, which is exactly what it will free.
        let words = unsafe {
            let ptr = alloc_zeroed(layout).cast::<AtomicU64>();
            if ptr.is_null() {
                handle_alloc_error(layout);
            }
            Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, WORDS))
        };
        Self { words }
    }

    /// Return whether `ip` was recorded.
    #[inline]
    pub fn contains(&self, ip: u32) -> bool {
        let (word, mask) = Self::locate(ip);
        self.words[word].load(Ordering::Relaxed) & mask != 0
    }

    #[inline]
    fn locate(ip: u32) -> (usize, u64) {
        ((ip >> 6) as usize, 1u64 << (ip & 63))
    }

    /// Number of set bits among words `range`.
    fn count_words(&self, start: usize, end: usize) -> u64 {
        self.words[start..end]
            .iter()
            .map(|word| u64::from(word.load(Ordering::Relaxed).count_ones()))
            .sum()
    }
}

impl Default for MemoryBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkTrait for MemoryBitmap {
    #[inline]
    fn record(&self, ip: u32) -> Result<()> {
        let (word, mask) = Self::locate(ip);
        self.words[word].fetch_or(mask, Ordering::Relaxed);
        Ok(())
    }

    /// Sum popcounts over `workers` contiguous slices of the address space.
    fn reduce(&self, workers: usize) -> Result<u64> {
        sum_partitions(WORDS as u64, workers, |_, range| {
            Ok(self.count_words(range.start as usize, range.end as usize))
        })
    }

    fn size_of(&self) -> usize {
        size_of::<Self>() + WORDS * size_of::<AtomicU64>()
    }
}

impl Debug for MemoryBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&SinkTrait::to_string(self))
    }
}
