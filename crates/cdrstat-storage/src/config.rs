//! Record Store Configuration
//!
//! ## StoreLayout
//!
//! Describes the externally guaranteed layout of the record store:
//!
//! - **records_per_phone**: Number of records (`K`) in every phone's block (default: 100000)
//! - **base_width**: Bytes per record slot at phone index 0, separator included
//!
//! ## StoreConfig
//!
//! Where the store lives and how to derive its layout. When `base_width` is `None`
//! the locator measures it from the head of the store file.
//!
//! ```ignore
//! use cdrstat_storage::StoreConfig;
//!
//! let config = StoreConfig {
//!     path: "./data/phones.json".into(),
//!     records_per_phone: 1000,
//!     base_width: Some(96),
//! };
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of records per phone block
pub const DEFAULT_RECORDS_PER_PHONE: u64 = 100_000;

/// Default slot width at phone index 0
pub const DEFAULT_BASE_WIDTH: u64 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLayout {
    /// Records per phone block (default: 100000)
    #[serde(default = "default_records_per_phone")]
    pub records_per_phone: u64,

    /// Slot width in bytes at phone index 0 (default: 96)
    #[serde(default = "default_base_width")]
    pub base_width: u64,
}

impl StoreLayout {
    pub fn new(records_per_phone: u64, base_width: u64) -> Self {
        Self {
            records_per_phone,
            base_width,
        }
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            records_per_phone: default_records_per_phone(),
            base_width: default_base_width(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the record store file
    pub path: PathBuf,

    /// Records per phone block (default: 100000)
    #[serde(default = "default_records_per_phone")]
    pub records_per_phone: u64,

    /// Slot width at phone index 0; measured from the file when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_width: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/phones.json"),
            records_per_phone: default_records_per_phone(),
            base_width: None,
        }
    }
}

fn default_records_per_phone() -> u64 {
    DEFAULT_RECORDS_PER_PHONE
}

fn default_base_width() -> u64 {
    DEFAULT_BASE_WIDTH
}
