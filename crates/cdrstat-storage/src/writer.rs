//! Store Writer - Record Stores that Follow the Width Model
//!
//! Writes a record store whose layout matches what [`RecordLocator`] assumes:
//! one JSON array, `K` records per phone in phone order, every record in block
//! `i` occupying exactly `W(i)` bytes. Each slot is the compact record JSON,
//! padded with spaces, followed by the `, ` separator (the last slot of the file
//! ends in `]\n` instead).
//!
//! ```text
//! [{"phone":0,"start_date":0,"end_date":7,"price":3.0}      , {"phone":0,...}      , ...
//!  └──────────────────────── W(0) bytes ─────────────────────┘
//! ```
//!
//! JSON ignores the padding, so the file parses normally for the full-scan
//! reader too. Used for test fixtures, benchmarks, and the demo data set.
//!
//! [`RecordLocator`]: crate::locator::RecordLocator

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use cdrstat_core::CallRecord;
use tracing::info;

use crate::config::StoreLayout;
use crate::error::{Error, Result};
use crate::locator::{RecordLocator, ARRAY_OPENER_LEN};

const SEPARATOR: &[u8] = b", ";
const CLOSER: &[u8] = b"]\n";

/// Writes width-model record stores
#[derive(Debug, Clone, Copy)]
pub struct StoreWriter {
    locator: RecordLocator,
}

impl StoreWriter {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            locator: RecordLocator::new(layout),
        }
    }

    /// Write blocks for phones `0..phone_count` to `out`.
    ///
    /// `record_for(phone, n)` supplies the `n`-th record of `phone`'s block; its
    /// `phone` field is written as returned. Returns the number of bytes written.
    pub fn write<W, F>(&self, out: W, phone_count: u64, mut record_for: F) -> Result<u64>
    where
        W: Write,
        F: FnMut(u64, u64) -> CallRecord,
    {
        let mut out = BufWriter::new(out);
        let records_per_phone = self.locator.layout().records_per_phone;

        out.write_all(b"[")?;
        let mut written = ARRAY_OPENER_LEN;

        for phone in 0..phone_count {
            let width = self.locator.record_width(phone);
            for n in 0..records_per_phone {
                let last = phone + 1 == phone_count && n + 1 == records_per_phone;
                let slot = encode_slot(&record_for(phone, n), width, last)?;
                out.write_all(&slot)?;
                written += slot.len() as u64;
            }
        }

        out.flush()?;
        Ok(written)
    }

    /// Write a store file on the blocking thread pool
    pub async fn write_file<F>(
        &self,
        path: impl AsRef<Path>,
        phone_count: u64,
        record_for: F,
    ) -> Result<u64>
    where
        F: FnMut(u64, u64) -> CallRecord + Send + 'static,
    {
        let path: PathBuf = path.as_ref().to_path_buf();
        let writer = *self;

        let written = tokio::task::spawn_blocking(move || -> Result<u64> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            writer.write(File::create(&path)?, phone_count, record_for)
        })
        .await??;

        info!(phone_count, written, "Wrote record store");
        Ok(written)
    }
}

/// Encode one record padded to exactly `width` bytes, terminator included
pub fn encode_slot(record: &CallRecord, width: u64, last: bool) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(record).map_err(std::io::Error::from)?;
    let tail = if last { CLOSER } else { SEPARATOR };

    let needed = (json.len() + tail.len()) as u64;
    if needed > width {
        return Err(Error::RecordTooWide {
            phone: record.phone,
            width,
            needed,
        });
    }

    let mut slot = json;
    slot.resize((width as usize) - tail.len(), b' ');
    slot.extend_from_slice(tail);
    Ok(slot)
}
