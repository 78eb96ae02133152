//! Report client configuration

use std::time::Duration;

use cdrstat_core::DEFAULT_REPORT_QUEUE;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Default bound on how long a call waits for its reply
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Queue requests are published to (default: report_queue)
    #[serde(default = "default_report_queue")]
    pub report_queue: String,

    /// Bound on the wait for each reply (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            report_queue: default_report_queue(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ClientConfig {
    /// Read `REPORT_QUEUE` and `REPORT_TIMEOUT_SECS` from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let report_queue = lookup("REPORT_QUEUE").unwrap_or_else(default_report_queue);

        let request_timeout = match lookup("REPORT_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: f64 = raw.trim().parse().map_err(|_| {
                    ClientError::Config(format!("REPORT_TIMEOUT_SECS is not a number: {raw}"))
                })?;
                Duration::try_from_secs_f64(secs).map_err(|e| {
                    ClientError::Config(format!("REPORT_TIMEOUT_SECS out of range: {e}"))
                })?
            }
            None => default_request_timeout(),
        };

        Ok(Self {
            report_queue,
            request_timeout,
        })
    }

    pub fn with_report_queue(mut self, report_queue: impl Into<String>) -> Self {
        self.report_queue = report_queue.into();
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

fn default_report_queue() -> String {
    DEFAULT_REPORT_QUEUE.to_string()
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}
