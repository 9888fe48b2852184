//! ## HyperLogLog representation
//! Estimates cardinality with `M = 2^P` registers, each holding the largest rank observed
//! among addresses hashed into it.
//!
//! [Original HyperLogLog paper](http://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf)
//!
//! Hash layout (64-bit `wyhash` of the address' big-endian bytes):
//! - 0..P bits     - register index.
//! - P..64 bits    - rank source, the rank is the 1-based position of its lowest set bit,
//!   saturated at `64 - P + 1` when no bit is set.
//!
//! Registers are `AtomicU8` updated with `fetch_max`, so they only ever grow and concurrent
//! workers hitting the same register never lose the larger rank.

use std::fmt::{Debug, Formatter};
use std::mem::size_of;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::counter::Phase;
use crate::error::{Error, Result};
use crate::reducer::{fork_join, partition};
use crate::sink::SinkTrait;

/// Smallest supported precision.
pub const MIN_PRECISION: u8 = 4;
/// Largest supported precision.
pub const MAX_PRECISION: u8 = 18;
/// Default precision, 32768 registers.
pub const DEFAULT_PRECISION: u8 = 15;

/// Seed for hashing addresses.
const HASH_SEED: u64 = 0;
/// `2^32`, the size of the IPv4 address space.
const TWO_32: f64 = 4_294_967_296.0;

pub struct HyperLogLog {
    precision: u8,
    registers: Box<[AtomicU8]>,
}

impl HyperLogLog {
    /// Create empty registers for precision `P`.
    pub fn new(precision: u8) -> Result<Self> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(Error::InvalidPrecision {
                precision,
                min: MIN_PRECISION,
                max: MAX_PRECISION,
            });
        }
        let registers = (0..1usize << precision)
            .map(|_| AtomicU8::new(0))
            .collect();
        Ok(Self {
            precision,
            registers,
        })
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Number of registers.
    #[inline]
    pub fn m(&self) -> usize {
        self.registers.len()
    }

    /// Current rank of register `idx`.
    #[inline]
    pub fn register(&self, idx: usize) -> u8 {
        self.registers[idx].load(Ordering::Relaxed)
    }

    /// Hash an address value.
    #[inline]
    pub fn hash(ip: u32) -> u64 {
        wyhash::wyhash(&ip.to_be_bytes(), HASH_SEED)
    }

    /// Split `hash` into register index and rank.
    #[inline]
    pub fn decode_hash(hash: u64, precision: u8) -> (usize, u8) {
        let idx = (hash & ((1 << precision) - 1)) as usize;
        let rest = hash >> precision;
        let rank = if rest == 0 {
            64 - precision + 1
        } else {
            rest.trailing_zeros() as u8 + 1
        };
        (idx, rank)
    }

    /// Estimate cardinality, summing registers over `workers` threads.
    pub fn estimate(&self, workers: usize) -> Result<f64> {
        let partials = fork_join(
            Phase::Reducing,
            partition(self.m() as u64, workers),
            |_, range| {
                let registers = &self.registers[range.start as usize..range.end as usize];
                let mut sum = 0.0;
                let mut zeros = 0usize;
                for register in registers {
                    let rank = register.load(Ordering::Relaxed);
                    sum += 0.5f64.powi(i32::from(rank));
                    zeros += usize::from(rank == 0);
                }
                Ok((sum, zeros))
            },
        )?;
        let (sum, zeros) = partials
            .into_iter()
            .fold((0.0, 0), |(sum, zeros), (s, z)| (sum + s, zeros + z));
        Ok(estimate(self.m(), sum, zeros))
    }
}

impl SinkTrait for HyperLogLog {
    #[inline]
    fn record(&self, ip: u32) -> Result<()> {
        let (idx, rank) = Self::decode_hash(Self::hash(ip), self.precision);
        self.registers[idx].fetch_max(rank, Ordering::Relaxed);
        Ok(())
    }

    fn reduce(&self, workers: usize) -> Result<u64> {
        Ok((self.estimate(workers)? + 0.5) as u64)
    }

    fn size_of(&self) -> usize {
        size_of::<Self>() + self.m() * size_of::<AtomicU8>()
    }
}

impl Debug for HyperLogLog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HyperLogLog {{ precision: {}, {} }}",
            self.precision,
            SinkTrait::to_string(self)
        )
    }
}

/// Parameter for bias correction
#[inline]
fn alpha(m: f64) -> f64 {
    0.7213 / (1.0 + 1.079 / m)
}

/// Estimate from the harmonic sum `Σ 2^-register` and the number of zero registers.
///
/// Raw estimate `alpha * m^2 / sum`, replaced by linear counting when it is at most `2.5 * m`
/// and some register is still zero, and by the large range correction above `2^32 / 30`.
pub fn estimate(m: usize, harmonic_sum: f64, zeros: usize) -> f64 {
    let m = m as f64;
    let mut e = alpha(m) * m * m / harmonic_sum;

    if e <= 2.5 * m && zeros > 0 {
        e = m * (m / zeros as f64).ln();
    }

    if e > TWO_32 / 30.0 {
        // beyond the address space the logarithm is undefined, the estimate saturates
        e = if e < TWO_32 {
            -TWO_32 * (1.0 - e / TWO_32).ln()
        } else {
            TWO_32
        };
    }

    e
}
