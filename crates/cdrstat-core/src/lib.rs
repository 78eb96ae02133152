//! cdrstat Core - records, statistics, and wire envelopes
//!
//! This crate holds the types shared by every other cdrstat crate:
//!
//! - [`CallRecord`]: one call-detail record as decoded from the record store
//! - [`Aggregator`]: folds records into per-phone accumulators and finalizes them
//! - [`PhoneStatistics`]: the finalized, externally visible per-phone report entry
//! - [`ReportRequest`] / [`ReplyEnvelope`]: the request and reply message bodies
//!
//! ## Data Flow
//!
//! ```text
//! record store bytes
//!        │ decode (cdrstat-storage)
//!        ▼
//!   CallRecord ──fold──► PhoneAccumulator ──finalize──► PhoneStatistics
//!                                                           │
//!                                                           ▼
//!                                                     ReplyEnvelope.data
//! ```
//!
//! The accumulator and the statistics entry are deliberately separate types:
//! the accumulator carries bookkeeping fields (duration sum, over-threshold
//! price totals) that never reach the serialized report.

pub mod envelope;
pub mod error;
pub mod record;
pub mod stats;

pub use envelope::{
    ReplyEnvelope, ReportRequest, ReportStatus, DEFAULT_REPORT_QUEUE, REPLY_FROM, REPLY_TO,
    TASK_RECEIVED_FORMAT,
};
pub use error::{Error, Result};
pub use record::CallRecord;
pub use stats::{
    Aggregator, BlockFold, DurationBucket, DurationBuckets, PhoneAccumulator, PhoneStatistics,
    PRICE_THRESHOLD,
};
