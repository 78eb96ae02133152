//! Record Decoder - Block Bytes to Call Records
//!
//! The locator's byte ranges are computed from a width model, so a block's tail
//! can hold a record that was cut off mid-way, plus separators or the closing
//! `]` of the array. The decoder:
//!
//! 1. Scans backward for the last record terminator (`}`)
//! 2. Drops everything after it
//! 3. Wraps the rest as a JSON array (`[` + bytes + `]`) and parses it
//!
//! ```text
//! {"phone":4,...}  , {"phone":4,...}  , {"phone":4,"start_d
//! └──────────── kept ────────────────┘ └──── dropped ────┘
//! ```
//!
//! Records are flat objects, so the last `}` always closes a complete record.
//! If the block does not start on a record boundary, parsing fails with
//! [`Error::Decode`]; callers treat that block as empty.

use cdrstat_core::CallRecord;
use memchr::memrchr;

use crate::error::{Error, Result};

/// Byte that closes every record
pub const RECORD_TERMINATOR: u8 = b'}';

/// Decode one block of the record store
pub fn decode_block(bytes: &[u8]) -> Result<Vec<CallRecord>> {
    let Some(last) = memrchr(RECORD_TERMINATOR, bytes) else {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        return Err(Error::Decode(format!(
            "no complete record in {} bytes",
            bytes.len()
        )));
    };

    let mut wrapped = Vec::with_capacity(last + 3);
    wrapped.push(b'[');
    wrapped.extend_from_slice(&bytes[..=last]);
    wrapped.push(b']');

    serde_json::from_slice(&wrapped).map_err(|e| Error::Decode(e.to_string()))
}
