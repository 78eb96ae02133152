//! Full-scan Baseline Reader
//!
//! Streams the whole record store through a JSON parser and folds every record
//! whose phone was requested. This is the slow fallback: its cost is linear in
//! the size of the store no matter how few phones are asked for.
//!
//! Unlike the indexed path, phones without matching records get no entry in the
//! resulting [`Aggregator`].
//!
//! Parsing is blocking, so [`scan_store`] runs it on the blocking thread pool.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use cdrstat_core::{Aggregator, CallRecord};
use serde::de::{Deserializer as _, SeqAccess, Visitor};
use tracing::debug;

use crate::error::{Error, Result};
use crate::reader::RecordStore;

/// Scan the store, aggregating records for `phones`
pub async fn scan_store(store: &RecordStore, phones: &[u64]) -> Result<Aggregator> {
    let path = store.path().to_path_buf();
    let wanted: HashSet<u64> = phones.iter().copied().collect();

    tokio::task::spawn_blocking(move || scan_file(&path, &wanted)).await?
}

/// Blocking full scan of the store file at `path`
pub fn scan_file(path: &Path, wanted: &HashSet<u64>) -> Result<Aggregator> {
    let reader = BufReader::new(File::open(path)?);
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let mut aggregator = Aggregator::new();

    let scanned = (&mut deserializer)
        .deserialize_seq(FoldingVisitor {
            wanted,
            aggregator: &mut aggregator,
        })
        .map_err(|e| Error::Scan(e.to_string()))?;
    deserializer.end().map_err(|e| Error::Scan(e.to_string()))?;

    debug!(
        scanned,
        matched_phones = aggregator.len(),
        "Full scan of {} complete",
        path.display()
    );

    Ok(aggregator)
}

/// Folds array elements one by one instead of materializing the array
struct FoldingVisitor<'a> {
    wanted: &'a HashSet<u64>,
    aggregator: &'a mut Aggregator,
}

impl<'de, 'a> Visitor<'de> for FoldingVisitor<'a> {
    /// Number of records scanned
    type Value = u64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of call records")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<u64, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut scanned = 0;
        while let Some(record) = seq.next_element::<CallRecord>()? {
            scanned += 1;
            if self.wanted.contains(&record.phone) {
                self.aggregator.fold(&record);
            }
        }
        Ok(scanned)
    }
}
