//! Request and Reply Message Bodies
//!
//! ## Request
//! ```text
//! { "phones": [1, 2, 3] }
//! ```
//! The correlation id and the reply destination travel in message metadata, not in
//! the body. [`ReportRequest::correlation_id`] lets a caller pick its own id; it is
//! never serialized.
//!
//! ## Reply
//! ```text
//! {
//!   "correlation_id": "5f0c...",
//!   "status": "Complete",
//!   "task_received": "2024-05-15 10:00:00",
//!   "from": "report_service",
//!   "to": "client",
//!   "data": [ { "phone": 1, "cnt_all_attempts": 3, ... } ],
//!   "total_duration": 0.042
//! }
//! ```
//! A reply with status `Error` carries an extra `error` message and empty `data`.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::PhoneStatistics;

/// Queue the report service consumes unless configured otherwise
pub const DEFAULT_REPORT_QUEUE: &str = "report_queue";

/// `from` field of every reply
pub const REPLY_FROM: &str = "report_service";

/// `to` field of every reply
pub const REPLY_TO: &str = "client";

/// strftime format of `task_received`
pub const TASK_RECEIVED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A report request: the phones to aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Caller-chosen correlation id; generated by the client when `None`
    #[serde(skip)]
    pub correlation_id: Option<String>,

    /// Requested phone indices (duplicates allowed, order not significant)
    pub phones: Vec<u64>,
}

impl ReportRequest {
    pub fn new(phones: Vec<u64>) -> Self {
        Self {
            correlation_id: None,
            phones,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Requested phones without duplicates, in first-occurrence order
    pub fn distinct_phones(&self) -> Vec<u64> {
        let mut seen = std::collections::HashSet::with_capacity(self.phones.len());
        self.phones
            .iter()
            .copied()
            .filter(|phone| seen.insert(*phone))
            .collect()
    }
}

/// Terminal state of a processed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Complete,
    Error,
}

/// The reply published for a report request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub correlation_id: String,
    pub status: ReportStatus,

    /// When the worker accepted the request, formatted with [`TASK_RECEIVED_FORMAT`]
    pub task_received: String,

    pub from: String,
    pub to: String,
    pub data: Vec<PhoneStatistics>,

    /// Wall-clock processing time in seconds
    pub total_duration: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplyEnvelope {
    pub fn complete(
        correlation_id: impl Into<String>,
        task_received: impl Into<String>,
        data: Vec<PhoneStatistics>,
        total_duration: f64,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: ReportStatus::Complete,
            task_received: task_received.into(),
            from: REPLY_FROM.to_string(),
            to: REPLY_TO.to_string(),
            data,
            total_duration,
            error: None,
        }
    }

    pub fn failed(
        correlation_id: impl Into<String>,
        task_received: impl Into<String>,
        error: impl Into<String>,
        total_duration: f64,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: ReportStatus::Error,
            task_received: task_received.into(),
            from: REPLY_FROM.to_string(),
            to: REPLY_TO.to_string(),
            data: Vec::new(),
            total_duration,
            error: Some(error.into()),
        }
    }

    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn is_complete(&self) -> bool {
        self.status == ReportStatus::Complete
    }

    /// Statistics entry for `phone`, if the report has one
    pub fn get(&self, phone: u64) -> Option<&PhoneStatistics> {
        self.data.iter().find(|entry| entry.phone == phone)
    }
}
