//! Error types for report client operations
//!
//! ## Error Handling Strategy
//!
//! - **Retriable errors**: `Timeout`, `Transport`
//! - **Caller errors**: `DuplicateCorrelationId`, `Config`
//! - **Fatal errors**: `Serialization`, `Disconnected`
//!
//! A timed-out call leaves nothing behind: its correlation entry is removed
//! before the error is returned, and a reply that arrives later is dropped.

use std::time::Duration;

use cdrstat_broker::BrokerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No reply arrived within the configured request timeout
    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(#[from] BrokerError),

    /// Another call with the same correlation id is still waiting
    #[error("Correlation id '{0}' is already in flight")]
    DuplicateCorrelationId(String),

    /// The request could not be encoded or the reply could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] cdrstat_core::Error),

    /// The reply queue closed while a call was waiting
    #[error("Reply queue closed")]
    Disconnected,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// True when sending the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout(_) | ClientError::Transport(_))
    }
}
