//! Record Locator - Phone Index to Byte Range
//!
//! This module maps a phone index to the byte range of the record store holding
//! that phone's block, without reading anything that precedes it.
//!
//! ## The Width Model
//!
//! The store is one JSON array whose records are grouped by phone index, `K`
//! records per phone. Records do not all serialize to the same width: the model
//! assumes the numeric fields widen by one digit every ten phone indices, so a
//! record slot (record text plus its separator) in block `i` is
//!
//! ```text
//! W(i) = BASE_WIDTH + i / 10
//! ```
//!
//! and the raw offset of block `i` is the sum of every preceding block:
//!
//! ```text
//! raw_start(i) = K * Σ_{n<i} W(n)
//!              = K * (BASE_WIDTH * i + 5q(q-1) + r*q)     where q = i / 10, r = i % 10
//! ```
//!
//! [`RecordLocator::locate`] shifts the raw range past the one-byte array opener
//! (`[`), so block `i` is `[raw_start(i) + 1, raw_start(i + 1) + 1)`. Adjacent
//! blocks share their boundary; there are no gaps or overlaps.
//!
//! ## Caveat
//!
//! This is a heuristic over a layout guaranteed by whoever wrote the store, not a
//! parser. It holds only if every record in a block really has the modeled
//! width. Whether the 10-index cadence matches every digit transition in real
//! data is unverified. When it does not, the located range starts mid-record and
//! the decoder reports a decode failure for that block.
//!
//! ## Calibration
//!
//! `BASE_WIDTH` can be configured, or observed from the store with
//! [`RecordLocator::calibrate`]: the distance between the first two record
//! openers at the head of the file is the slot width at index 0.

use memchr::memchr;
use tracing::{debug, warn};

use crate::config::{StoreConfig, StoreLayout};
use crate::error::{Error, Result};
use crate::reader::RecordStore;

/// Length of the array opener that precedes the first block
pub const ARRAY_OPENER_LEN: u64 = 1;

/// Phone indices per one-byte widening step
pub const WIDTH_STEP: u64 = 10;

/// Bytes read from the head of the store during calibration
const CALIBRATION_WINDOW: u64 = 64 * 1024;

/// Half-open byte range `[start, end)` in the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Computes per-phone block ranges from the store layout
#[derive(Debug, Clone, Copy)]
pub struct RecordLocator {
    layout: StoreLayout,
}

impl RecordLocator {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Build a locator from config, calibrating against the store when no base
    /// width is configured
    pub async fn from_config(store: &RecordStore, config: &StoreConfig) -> Result<Self> {
        match config.base_width {
            Some(base_width) => Ok(Self::new(StoreLayout::new(
                config.records_per_phone,
                base_width,
            ))),
            None => Self::calibrate(store, config.records_per_phone).await,
        }
    }

    /// Measure the slot width at phone index 0 from the head of the store
    pub async fn calibrate(store: &RecordStore, records_per_phone: u64) -> Result<Self> {
        let head = store.read_head(CALIBRATION_WINDOW).await?;

        let first = memchr(b'{', &head)
            .ok_or_else(|| Error::Calibration("no record found at head of store".to_string()))?;
        let second = memchr(b'{', &head[first + 1..])
            .map(|pos| first + 1 + pos)
            .ok_or_else(|| {
                Error::Calibration(format!(
                    "need two records within the first {} bytes",
                    CALIBRATION_WINDOW
                ))
            })?;

        if first as u64 != ARRAY_OPENER_LEN {
            warn!(
                "First record starts at byte {} instead of {}; located ranges will be offset",
                first, ARRAY_OPENER_LEN
            );
        }

        let base_width = (second - first) as u64;
        debug!(base_width, records_per_phone, "Calibrated record locator");

        Ok(Self::new(StoreLayout::new(records_per_phone, base_width)))
    }

    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    /// Modeled slot width of a record in `phone`'s block
    pub fn record_width(&self, phone: u64) -> u64 {
        self.layout.base_width + phone / WIDTH_STEP
    }

    /// Byte range of `phone`'s block
    pub fn locate(&self, phone: u64) -> Result<ByteRange> {
        let next = phone.checked_add(1).ok_or(Error::LocatorOverflow(phone))?;
        let start = self.raw_start(phone)?;
        let end = self.raw_start(next)?;

        let shift = |offset: u64| {
            offset
                .checked_add(ARRAY_OPENER_LEN)
                .ok_or(Error::LocatorOverflow(phone))
        };

        Ok(ByteRange::new(shift(start)?, shift(end)?))
    }

    /// Offset of `phone`'s block relative to the first record
    fn raw_start(&self, phone: u64) -> Result<u64> {
        let overflow = || Error::LocatorOverflow(phone);

        let q = phone / WIDTH_STEP;
        let r = phone % WIDTH_STEP;

        // Σ_{n<phone} n/10: ten full steps of each width below q, then r more at q
        let widened = 5u64
            .checked_mul(q)
            .and_then(|v| v.checked_mul(q.saturating_sub(1)))
            .and_then(|v| v.checked_add(r * q))
            .ok_or_else(overflow)?;

        self.layout
            .base_width
            .checked_mul(phone)
            .and_then(|v| v.checked_add(widened))
            .and_then(|v| v.checked_mul(self.layout.records_per_phone))
            .ok_or_else(overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn locator(records_per_phone: u64, base_width: u64) -> RecordLocator {
        RecordLocator::new(StoreLayout::new(records_per_phone, base_width))
    }

    /// Direct summation of the width model
    fn naive_start(loc: &RecordLocator, phone: u64) -> u64 {
        (0..phone)
            .map(|n| loc.record_width(n) * loc.layout().records_per_phone)
            .sum::<u64>()
            + ARRAY_OPENER_LEN
    }

    #[test]
    fn test_first_block_starts_after_opener() {
        let loc = locator(100_000, 80);
        assert_eq!(loc.locate(0).unwrap(), ByteRange::new(1, 8_000_001));
    }

    #[test]
    fn test_width_steps_every_ten_indices() {
        let loc = locator(10, 80);
        assert_eq!(loc.record_width(0), 80);
        assert_eq!(loc.record_width(9), 80);
        assert_eq!(loc.record_width(10), 81);
        assert_eq!(loc.record_width(25), 82);
    }

    #[test]
    fn test_block_length_matches_width() {
        let loc = locator(1000, 80);
        assert_eq!(loc.locate(9).unwrap().len(), 80_000);
        assert_eq!(loc.locate(10).unwrap().len(), 81_000);
        assert_eq!(loc.locate(123).unwrap().len(), 92_000);
    }

    #[test]
    fn test_closed_form_matches_summation() {
        let loc = locator(7, 83);
        for phone in 0..250 {
            assert_eq!(
                loc.locate(phone).unwrap().start,
                naive_start(&loc, phone),
                "phone {phone}"
            );
        }
    }

    #[test]
    fn test_overflow_is_reported() {
        let loc = locator(100_000, 80);
        assert!(matches!(
            loc.locate(u64::MAX),
            Err(Error::LocatorOverflow(_))
        ));
        assert!(matches!(
            loc.locate(u64::MAX / 2),
            Err(Error::LocatorOverflow(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_adjacent_blocks_are_contiguous(
            phone in 0u64..1_000_000,
            records_per_phone in 1u64..200_000,
            base_width in 16u64..256,
        ) {
            let loc = locator(records_per_phone, base_width);
            let current = loc.locate(phone).unwrap();
            let next = loc.locate(phone + 1).unwrap();
            prop_assert_eq!(next.start, current.end);
            prop_assert!(current.start < current.end);
        }
    }
}
