//! In-process broker
//!
//! Each queue is an unbounded tokio channel. The sender half stays in the queue
//! table; the receiver half is handed to the first subscriber. Messages published
//! before anyone subscribes are buffered in the channel.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::error::{BrokerError, Result};
use crate::message::Message;
use crate::{Broker, Subscription};

struct QueueSlot {
    sender: mpsc::UnboundedSender<Message>,

    /// Taken by the first subscriber
    receiver: Option<mpsc::UnboundedReceiver<Message>>,
}

impl QueueSlot {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

/// Broker whose queues live in this process
#[derive(Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, QueueSlot>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of declared queues
    pub async fn queue_count(&self) -> usize {
        self.queues.lock().await.len()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_queue(&self, name: &str) -> Result<()> {
        let mut queues = self.queues.lock().await;
        queues.entry(name.to_string()).or_insert_with(QueueSlot::new);
        Ok(())
    }

    async fn declare_exclusive_queue(&self) -> Result<String> {
        let name = format!("amq.gen-{}", Uuid::new_v4().simple());
        self.queues
            .lock()
            .await
            .insert(name.clone(), QueueSlot::new());
        debug!(queue = %name, "Declared exclusive queue");
        Ok(name)
    }

    async fn delete_queue(&self, name: &str) -> Result<()> {
        self.queues
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BrokerError::QueueNotFound(name.to_string()))
    }

    async fn publish(&self, routing_key: &str, message: Message) -> Result<()> {
        let sender = {
            let queues = self.queues.lock().await;
            queues
                .get(routing_key)
                .map(|slot| slot.sender.clone())
                .ok_or_else(|| BrokerError::QueueNotFound(routing_key.to_string()))?
        };

        sender
            .send(message)
            .map_err(|_| BrokerError::Closed(routing_key.to_string()))
    }

    async fn subscribe(&self, queue: &str) -> Result<Subscription> {
        let mut queues = self.queues.lock().await;
        let slot = queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;

        let receiver = slot
            .receiver
            .take()
            .ok_or_else(|| BrokerError::QueueAlreadyConsumed(queue.to_string()))?;

        Ok(Subscription::new(queue, receiver))
    }
}
