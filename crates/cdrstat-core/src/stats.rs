//! Per-phone Call Statistics
//!
//! This module implements the aggregation algorithm that turns a sequence of
//! [`CallRecord`]s into one statistics entry per phone.
//!
//! ## Two Types, Two Audiences
//!
//! - [`PhoneAccumulator`] is the mutable, internal-only running state. Besides the
//!   counters that reach the report, it carries bookkeeping that never leaves this
//!   crate: the duration sum (only used to derive the average) and the total/count
//!   of prices over [`PRICE_THRESHOLD`].
//! - [`PhoneStatistics`] is the finalized, serialized entry. It is produced exactly
//!   once per phone per request by [`PhoneAccumulator::finalize`].
//!
//! ## Folding a Record
//!
//! For a record with phone `p`:
//! 1. Create a zeroed accumulator for `p` if absent
//! 2. `attempt_count += 1`, `sum_duration += duration` (summed as `i128`)
//! 3. If `price > 15`: add to the over-threshold total and count
//! 4. Update min/max price (the first record seeds both)
//! 5. Classify the duration into exactly one bucket
//!
//! ## Duration Buckets
//!
//! | bucket   | rule             | wire key    |
//! |----------|------------------|-------------|
//! | short    | `d <= 10`        | `10_sec`    |
//! | medium   | `10 < d <= 30`   | `10_30_sec` |
//! | long     | `d > 30`         | `30_sec`    |
//!
//! ## Paths
//!
//! The same [`Aggregator`] serves both read paths:
//! - **Full scan**: every record of the store is offered, filtered by membership in
//!   the requested set before [`Aggregator::fold`] is called. Phones without records
//!   never get an entry.
//! - **Indexed**: each requested phone's block is handed to
//!   [`Aggregator::fold_block`], which creates the entry up front. Phones whose block
//!   yielded no records still get an entry with `attempt_count == 0`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::record::CallRecord;

/// Prices strictly above this value are tracked in the over-threshold bookkeeping.
pub const PRICE_THRESHOLD: f64 = 15.0;

/// Longest duration (inclusive) counted as a short call.
pub const SHORT_CALL_MAX: i64 = 10;

/// Longest duration (inclusive) counted as a medium call.
pub const MEDIUM_CALL_MAX: i64 = 30;

/// Duration class of a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBucket {
    Short,
    Medium,
    Long,
}

impl DurationBucket {
    pub fn classify(duration: i64) -> Self {
        if duration <= SHORT_CALL_MAX {
            DurationBucket::Short
        } else if duration <= MEDIUM_CALL_MAX {
            DurationBucket::Medium
        } else {
            DurationBucket::Long
        }
    }
}

/// Per-bucket call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBuckets {
    #[serde(rename = "10_sec")]
    pub short: u64,

    #[serde(rename = "10_30_sec")]
    pub medium: u64,

    #[serde(rename = "30_sec")]
    pub long: u64,
}

impl DurationBuckets {
    fn record(&mut self, bucket: DurationBucket) {
        match bucket {
            DurationBucket::Short => self.short += 1,
            DurationBucket::Medium => self.medium += 1,
            DurationBucket::Long => self.long += 1,
        }
    }

    /// Sum of all three counters
    pub fn total(&self) -> u64 {
        self.short + self.medium + self.long
    }
}

/// Running statistics for one phone during a single aggregation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhoneAccumulator {
    attempt_count: u64,
    duration_buckets: DurationBuckets,
    min_price: Option<f64>,
    max_price: Option<f64>,
    sum_duration: i128,
    sum_price_over_threshold: f64,
    count_price_over_threshold: u64,
}

impl PhoneAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the running state
    pub fn add(&mut self, record: &CallRecord) {
        let duration = record.duration();
        let price = record.price;

        self.attempt_count += 1;
        self.sum_duration += i128::from(duration);

        if price > PRICE_THRESHOLD {
            self.sum_price_over_threshold += price;
            self.count_price_over_threshold += 1;
        }

        self.min_price = Some(self.min_price.map_or(price, |min| min.min(price)));
        self.max_price = Some(self.max_price.map_or(price, |max| max.max(price)));

        self.duration_buckets.record(DurationBucket::classify(duration));
    }

    pub fn attempt_count(&self) -> u64 {
        self.attempt_count
    }

    pub fn duration_buckets(&self) -> DurationBuckets {
        self.duration_buckets
    }

    pub fn sum_duration(&self) -> i128 {
        self.sum_duration
    }

    pub fn sum_price_over_threshold(&self) -> f64 {
        self.sum_price_over_threshold
    }

    pub fn count_price_over_threshold(&self) -> u64 {
        self.count_price_over_threshold
    }

    /// Average duration, `0` when no attempts were seen
    pub fn avg_duration(&self) -> f64 {
        if self.attempt_count == 0 {
            0.0
        } else {
            self.sum_duration as f64 / self.attempt_count as f64
        }
    }

    /// Produce the externally visible entry, dropping the bookkeeping fields
    pub fn finalize(self, phone: u64) -> PhoneStatistics {
        PhoneStatistics {
            phone,
            attempt_count: self.attempt_count,
            duration_buckets: self.duration_buckets,
            min_price: self.min_price,
            max_price: self.max_price,
            avg_duration: self.avg_duration(),
        }
    }
}

/// Finalized statistics for one phone, as published in a report
///
/// `min_price`/`max_price` are `None` (serialized as `null`) for an entry that saw
/// no records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneStatistics {
    pub phone: u64,

    #[serde(rename = "cnt_all_attempts")]
    pub attempt_count: u64,

    #[serde(rename = "cnt_att_dur")]
    pub duration_buckets: DurationBuckets,

    #[serde(rename = "min_price_att")]
    pub min_price: Option<f64>,

    #[serde(rename = "max_price_att")]
    pub max_price: Option<f64>,

    #[serde(rename = "avg_dur_att")]
    pub avg_duration: f64,
}

/// Outcome of handing one phone's block to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFold {
    /// The block was folded. `strays` counts records that belonged to another
    /// phone and were dropped.
    Folded { records: usize, strays: usize },

    /// This phone's block was already folded during this pass; nothing changed.
    AlreadyFolded,
}

/// Folds call records into per-phone accumulators
///
/// One `Aggregator` covers one request. Entries are kept ordered by phone so the
/// finalized report is deterministic.
#[derive(Debug, Default)]
pub struct Aggregator {
    entries: BTreeMap<u64, PhoneAccumulator>,
    folded_blocks: HashSet<u64>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record, creating the phone's entry on first sight
    pub fn fold(&mut self, record: &CallRecord) {
        self.entries.entry(record.phone).or_default().add(record);
    }

    /// Fold every record of a sequence
    pub fn fold_all<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a CallRecord>,
    {
        for record in records {
            self.fold(record);
        }
    }

    /// Make sure an entry exists for `phone`, even if no record ever arrives
    pub fn track(&mut self, phone: u64) {
        self.entries.entry(phone).or_default();
    }

    /// Fold the block of records located for `phone`.
    ///
    /// Each block is folded at most once per pass, so a phone requested twice
    /// never double counts. Records carrying a different phone are dropped.
    pub fn fold_block(&mut self, phone: u64, records: &[CallRecord]) -> BlockFold {
        if !self.folded_blocks.insert(phone) {
            return BlockFold::AlreadyFolded;
        }

        let entry = self.entries.entry(phone).or_default();
        let mut strays = 0;
        for record in records {
            if record.phone == phone {
                entry.add(record);
            } else {
                strays += 1;
            }
        }

        BlockFold::Folded {
            records: records.len() - strays,
            strays,
        }
    }

    pub fn get(&self, phone: u64) -> Option<&PhoneAccumulator> {
        self.entries.get(&phone)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finalize every entry, ordered by phone
    pub fn finalize(self) -> Vec<PhoneStatistics> {
        self.entries
            .into_iter()
            .map(|(phone, acc)| acc.finalize(phone))
            .collect()
    }
}
