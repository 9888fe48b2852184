use enum_dispatch::enum_dispatch;

use crate::bitmap::MemoryBitmap;
use crate::config::{Config, Strategy};
use crate::disk::DiskBitmap;
use crate::error::{Error, Result};
use crate::hyperloglog::HyperLogLog;

/// Shared structures a run can record addresses into.
#[derive(Debug)]
#[enum_dispatch]
pub enum Sink {
    Memory(MemoryBitmap),
    Disk(DiskBitmap),
    Hll(HyperLogLog),
}

/// Sink trait which must be implemented by all counting strategies.
///
/// `record` is called concurrently by every scanning worker without outside locking,
/// implementations keep themselves consistent.
#[enum_dispatch(Sink)]
pub trait SinkTrait {
    fn record(&self, ip: u32) -> Result<()>;
    /// Make every recorded address visible to `reduce`. Called once after the ingest barrier.
    fn finish(&self) -> Result<()> {
        Ok(())
    }
    fn reduce(&self, workers: usize) -> Result<u64>;
    fn size_of(&self) -> usize;
    fn to_string(&self) -> String {
        format!("size: {}", self.size_of())
    }
}

impl Sink {
    /// Create the sink for the configured strategy.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(match config.strategy {
            Strategy::ExactMemory => MemoryBitmap::new().into(),
            Strategy::ExactDisk => {
                let path = config.bitmap_path().ok_or(Error::MissingBitmapPath)?;
                DiskBitmap::create(path, config.workers)?.into()
            }
            Strategy::ApproximateHll => HyperLogLog::new(config.hll_precision)?.into(),
        })
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Sink::Memory(_) => Strategy::ExactMemory,
            Sink::Disk(_) => Strategy::ExactDisk,
            Sink::Hll(_) => Strategy::ApproximateHll,
        }
    }
}
