//! Fork-join helpers used by the reduction phase.
use std::ops::Range;
use std::thread;

use crate::counter::Phase;
use crate::error::{Error, Result};

/// Split `[0, total)` into `parts` contiguous ranges, the last one absorbing the remainder.
pub fn partition(total: u64, parts: usize) -> Vec<Range<u64>> {
    let parts = parts.max(1) as u64;
    let chunk_len = total / parts;
    (0..parts)
        .map(|i| {
            let start = i * chunk_len;
            let end = if i + 1 == parts {
                total
            } else {
                start + chunk_len
            };
            start..end
        })
        .collect()
}

/// Run `f(index, range)` once per range on scoped threads and collect results in range order.
///
/// Returns only after every thread joined. The first error (in range order) wins.
pub fn fork_join<T, F>(phase: Phase, ranges: Vec<Range<u64>>, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, Range<u64>) -> Result<T> + Sync,
{
    let f = &f;
    thread::scope(|s| {
        let handles: Vec<_> = ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| s.spawn(move || f(index, range)))
            .collect();
        // join everything before inspecting results, an unjoined panicked thread
        // would otherwise re-panic when the scope ends
        let joined: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();
        joined
            .into_iter()
            .map(|result| {
                result.map_err(|_| Error::WorkerPanicked { phase })?
            })
            .collect()
    })
}

/// Parallel sum over `parts` partitions of `[0, total)`.
pub fn sum_partitions<F>(total: u64, parts: usize, f: F) -> Result<u64>
where
    F: Fn(usize, Range<u64>) -> Result<u64> + Sync,
{
    Ok(fork_join(Phase::Reducing, partition(total, parts), f)?
        .into_iter()
        .sum())
}
