//! `ipv4-distinct-counter` counts the distinct IPv4 addresses in a newline-delimited text file
//! that is too large for a comfortable sequential pass.
//!
//! The file is split into line-aligned byte ranges scanned by parallel workers, all feeding one
//! shared structure: an exact in-memory bitmap of the whole address space, the same bitmap kept
//! in a file, or HyperLogLog registers for an approximate count.
pub mod bitmap;
pub mod config;
pub mod counter;
pub mod disk;
pub mod error;
pub mod hyperloglog;
pub mod logging;
pub mod parse;
pub mod planner;
pub mod reducer;
pub mod scanner;
#[cfg(feature = "with_serde")]
mod serde;
pub mod sink;

pub use crate::config::{Config, Strategy};
pub use crate::counter::{count_distinct, CountReport, DistinctCounter, Phase};
pub use crate::error::{Error, Result};
pub use crate::scanner::ParsePolicy;
