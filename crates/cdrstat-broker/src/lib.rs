//! cdrstat Broker - the transport seam
//!
//! The report service and client never talk to a concrete message broker. They
//! use the [`Broker`] trait, which captures the handful of primitives the
//! request/reply protocol needs:
//!
//! - named queues, declared idempotently
//! - exclusive, server-named queues for private reply destinations
//! - publish to a queue by routing key (default-exchange semantics)
//! - a single consumer per queue, delivering messages as a stream
//!
//! Durability, routing topologies, and reconnection are the transport's concern.
//!
//! ## Implementations
//!
//! - [`InMemoryBroker`]: in-process queues on tokio channels. Used by tests and
//!   by deployments that embed the service and its clients in one process.
//!
//! ## Example
//!
//! ```ignore
//! use cdrstat_broker::{Broker, InMemoryBroker, Message};
//!
//! let broker = InMemoryBroker::new();
//! broker.declare_queue("report_queue").await?;
//! let mut subscription = broker.subscribe("report_queue").await?;
//!
//! broker
//!     .publish("report_queue", Message::json(r#"{"phones":[1]}"#).with_correlation_id("abc"))
//!     .await?;
//! let delivered = subscription.next().await;
//! ```

pub mod error;
pub mod memory;
pub mod message;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use error::{BrokerError, Result};
pub use memory::InMemoryBroker;
pub use message::{Message, MessageProperties};

/// Host name selecting the in-process broker
pub const MEMORY_HOST: &str = "memory";

/// Publish/subscribe primitives required by the report protocol
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare a named queue. Declaring an existing queue is a no-op.
    async fn declare_queue(&self, name: &str) -> Result<()>;

    /// Declare a queue with a broker-generated name, private to the caller
    async fn declare_exclusive_queue(&self) -> Result<String>;

    /// Delete a queue; pending messages are dropped
    async fn delete_queue(&self, name: &str) -> Result<()>;

    /// Publish a message to the queue named by `routing_key`
    async fn publish(&self, routing_key: &str, message: Message) -> Result<()>;

    /// Become the consumer of `queue`
    async fn subscribe(&self, queue: &str) -> Result<Subscription>;
}

/// Message stream of one consumed queue
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl Subscription {
    pub fn new(queue: impl Into<String>, receiver: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            queue: queue.into(),
            receiver,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Next delivered message, `None` once the queue is deleted
    pub async fn next(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

/// Connect to the broker named by `host`
pub fn connect(host: &str) -> Result<Arc<dyn Broker>> {
    match host {
        MEMORY_HOST => Ok(Arc::new(InMemoryBroker::new())),
        other => Err(BrokerError::UnsupportedTransport(other.to_string())),
    }
}
