//! Call Record Data Structure
//!
//! This module defines `CallRecord` - one call-detail record (CDR) in the record store.
//!
//! ## Structure
//! Each record contains:
//! - **phone**: Non-negative phone index the call belongs to
//! - **start_time**: Call start, milliseconds since epoch (`start_date` on disk)
//! - **end_time**: Call end, milliseconds since epoch (`end_date` on disk)
//! - **price**: Call price, `0` when the field is absent
//!
//! ## On-disk Shape
//! ```text
//! {"phone": 2, "start_date": 1684108800000, "end_date": 1684108800015, "price": 16}
//! ```
//!
//! Records are not validated on decode. A record whose `end_date` precedes its
//! `start_date` has a negative duration and lands in the short bucket. A
//! duration outside the `i64` range saturates at `i64::MAX` / `i64::MIN`.

use serde::{Deserialize, Serialize};

/// A single call-detail record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Phone index this call belongs to
    pub phone: u64,

    /// Call start in milliseconds since epoch
    #[serde(rename = "start_date")]
    pub start_time: i64,

    /// Call end in milliseconds since epoch
    #[serde(rename = "end_date")]
    pub end_time: i64,

    /// Call price
    #[serde(default)]
    pub price: f64,
}

impl CallRecord {
    pub fn new(phone: u64, start_time: i64, end_time: i64, price: f64) -> Self {
        Self {
            phone,
            start_time,
            end_time,
            price,
        }
    }

    /// Call duration (`end_time - start_time`), saturating at the `i64` bounds
    pub fn duration(&self) -> i64 {
        self.end_time.saturating_sub(self.start_time)
    }
}
