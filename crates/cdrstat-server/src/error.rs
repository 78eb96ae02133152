//! Report service errors
//!
//! Errors from handling a single request are turned into an `Error` reply and
//! never stop the service. Only failures to set up the request queue end
//! [`ReportService::start`](crate::ReportService::start).

use cdrstat_broker::BrokerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Storage(#[from] cdrstat_storage::Error),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Invalid message body: {0}")]
    Codec(#[from] cdrstat_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The request named no queue to reply to
    #[error("Request {0} has no reply destination")]
    MissingReplyTo(String),
}
