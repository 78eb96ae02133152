//! Storage Error Types
//!
//! ## Error Categories
//!
//! ### Block-local Errors
//! These affect a single phone's block. The report service recovers from them by
//! treating the block as empty; see [`Error::is_block_local`].
//! - `Decode`: a block's bytes could not be parsed, even after truncating the
//!   partial trailing record. Usually means the width model drifted from the
//!   real layout.
//! - `LocatorOverflow`: the offset of a phone index does not fit in 64 bits
//!
//! ### Store Errors
//! - `Io`: the record store could not be opened or read
//! - `Scan`: the full-scan reader hit malformed JSON
//! - `Calibration`: the head of the store does not contain two records to measure
//! - `RecordTooWide`: the store writer cannot fit a record into its slot
//! - `Join`: a blocking scan task panicked or was cancelled

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Block decode failed: {0}")]
    Decode(String),

    #[error("Byte offset overflow locating phone {0}")]
    LocatorOverflow(u64),

    #[error("Full scan failed: {0}")]
    Scan(String),

    #[error("Calibration failed: {0}")]
    Calibration(String),

    #[error("Record for phone {phone} needs {needed} bytes but its slot is {width}")]
    RecordTooWide { phone: u64, width: u64, needed: u64 },

    #[error("Join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// True for failures confined to one phone's block
    pub fn is_block_local(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::LocatorOverflow(_))
    }
}
