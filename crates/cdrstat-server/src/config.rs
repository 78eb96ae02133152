//! Report service configuration
//!
//! All settings come from environment variables:
//!
//! - `BROKER_HOST`: broker to connect to, `memory` for in-process (default: memory)
//! - `REPORT_QUEUE`: request queue name (default: report_queue)
//! - `ONE_PHONE_RECORDS_COUNT`: records per phone block (default: 100000)
//! - `PHONE_DATA_STORAGE_PATH`: record store path (default: ./data/phones.json)
//! - `RECORD_BASE_WIDTH`: slot width at phone index 0 (default: measured from the store)
//! - `SCAN_MODE`: `indexed` or `full` (default: indexed)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use cdrstat_broker::MEMORY_HOST;
use cdrstat_core::DEFAULT_REPORT_QUEUE;
use cdrstat_storage::{StoreConfig, DEFAULT_RECORDS_PER_PHONE};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// How the service reads records for a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Read only the requested phones' blocks
    #[default]
    Indexed,

    /// Stream the whole store; no layout assumptions
    Full,
}

impl FromStr for ScanMode {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indexed" => Ok(ScanMode::Indexed),
            "full" => Ok(ScanMode::Full),
            other => Err(ServiceError::Config(format!(
                "SCAN_MODE must be 'indexed' or 'full', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Indexed => write!(f, "indexed"),
            ScanMode::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub broker_host: String,
    pub report_queue: String,
    pub store: StoreConfig,
    #[serde(default)]
    pub scan_mode: ScanMode,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            broker_host: MEMORY_HOST.to_string(),
            report_queue: DEFAULT_REPORT_QUEUE.to_string(),
            store: StoreConfig::default(),
            scan_mode: ScanMode::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let broker_host = lookup("BROKER_HOST").unwrap_or_else(|| MEMORY_HOST.to_string());
        let report_queue =
            lookup("REPORT_QUEUE").unwrap_or_else(|| DEFAULT_REPORT_QUEUE.to_string());

        let path = lookup("PHONE_DATA_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| StoreConfig::default().path);

        let records_per_phone = parse_var(&lookup, "ONE_PHONE_RECORDS_COUNT")?
            .unwrap_or(DEFAULT_RECORDS_PER_PHONE);
        if records_per_phone == 0 {
            return Err(ServiceError::Config(
                "ONE_PHONE_RECORDS_COUNT must be positive".to_string(),
            ));
        }

        let base_width = parse_var(&lookup, "RECORD_BASE_WIDTH")?;
        if base_width == Some(0) {
            return Err(ServiceError::Config(
                "RECORD_BASE_WIDTH must be positive".to_string(),
            ));
        }

        let scan_mode = match lookup("SCAN_MODE") {
            Some(raw) => raw.parse()?,
            None => ScanMode::default(),
        };

        Ok(Self {
            broker_host,
            report_queue,
            store: StoreConfig {
                path,
                records_per_phone,
                base_width,
            },
            scan_mode,
        })
    }
}

fn parse_var<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| ServiceError::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}
