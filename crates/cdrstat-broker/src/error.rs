//! Error types for broker operations
//!
//! Every variant is a transport failure from the point of view of the report
//! service and client. None of them are retried inside cdrstat; reconnection and
//! redelivery belong to the transport.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Queue '{0}' does not exist")]
    QueueNotFound(String),

    #[error("Queue '{0}' already has a consumer")]
    QueueAlreadyConsumed(String),

    #[error("Queue '{0}' is closed")]
    Closed(String),

    #[error("Unsupported broker host '{0}'")]
    UnsupportedTransport(String),
}
