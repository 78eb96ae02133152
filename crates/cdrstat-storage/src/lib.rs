//! cdrstat Storage Layer
//!
//! This crate turns "give me phone 42's records" into a single positioned read of
//! the record store instead of a scan of the whole file.
//!
//! ## Architecture Overview
//!
//! ```text
//! phone index
//!      │
//!      ▼
//! ┌─────────────────┐
//! │ RecordLocator   │  width model → byte range, no I/O
//! └────────┬────────┘
//!          │ ByteRange
//!          ▼
//! ┌─────────────────┐
//! │ RecordStore     │  scoped positioned read, no shared cursor
//! └────────┬────────┘
//!          │ Bytes
//!          ▼
//! ┌─────────────────┐
//! │ decode_block    │  truncate partial tail, parse
//! └────────┬────────┘
//!          │ Vec<CallRecord>
//!          ▼
//!     Aggregator (cdrstat-core)
//! ```
//!
//! [`scan_store`] is the slow baseline that streams the entire store; it needs
//! no layout assumptions and serves as a fallback.
//!
//! ## Usage Example
//!
//! ```ignore
//! use cdrstat_storage::{decode_block, RecordLocator, RecordStore, StoreConfig};
//!
//! let config = StoreConfig::default();
//! let store = RecordStore::open(&config.path).await?;
//! let locator = RecordLocator::from_config(&store, &config).await?;
//!
//! let bytes = store.read_range(locator.locate(42)?).await?;
//! let records = decode_block(&bytes)?;
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod locator;
pub mod reader;
pub mod scan;
pub mod writer;

pub use config::{StoreConfig, StoreLayout, DEFAULT_BASE_WIDTH, DEFAULT_RECORDS_PER_PHONE};
pub use decoder::decode_block;
pub use error::{Error, Result};
pub use locator::{ByteRange, RecordLocator};
pub use reader::RecordStore;
pub use scan::scan_store;
pub use writer::StoreWriter;
