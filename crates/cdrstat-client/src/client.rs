//! Report Client
//!
//! Sends report requests to the report queue and routes each reply back to the
//! call that is waiting for it.
//!
//! ## Correlation
//!
//! Every call registers a one-shot slot in a shared table, keyed by its
//! correlation id, before the request is published. A single dispatcher task
//! consumes the client's private reply queue and completes the slot whose id
//! matches the reply. Any number of calls may be in flight at once; a reply can
//! only ever reach the call that sent the matching request.
//!
//! ## Cleanup
//!
//! The slot is removed when the call finishes for any reason: reply received,
//! timeout, publish failure, or the call future being dropped. Replies whose id
//! has no slot are logged and discarded.

use std::collections::HashMap;
use std::sync::Arc;

use cdrstat_broker::{Broker, Message, Subscription};
use cdrstat_core::{ReplyEnvelope, ReportRequest};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// Request/reply client for the report service
pub struct ReportClient {
    broker: Arc<dyn Broker>,
    config: ClientConfig,
    reply_queue: String,
    pending: PendingReplies,
    dispatcher: JoinHandle<()>,

    /// Set once `close` has deleted the reply queue
    closed: bool,
}

impl ReportClient {
    /// Declare a private reply queue and start routing replies
    pub async fn connect(broker: Arc<dyn Broker>, config: ClientConfig) -> Result<Self> {
        let reply_queue = broker.declare_exclusive_queue().await?;
        let subscription = broker.subscribe(&reply_queue).await?;

        let pending = PendingReplies::default();
        let dispatcher = tokio::spawn(dispatch_replies(subscription, Arc::clone(&pending)));

        info!(
            reply_queue = %reply_queue,
            report_queue = %config.report_queue,
            "Report client connected"
        );

        Ok(Self {
            broker,
            config,
            reply_queue,
            pending,
            dispatcher,
            closed: false,
        })
    }

    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Calls currently waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Request a report for `phones` under a fresh correlation id
    pub async fn call_phones(&self, phones: Vec<u64>) -> Result<ReplyEnvelope> {
        self.call(ReportRequest::new(phones)).await
    }

    /// Publish `request` and wait for its reply
    ///
    /// Uses the request's own correlation id when it has one. Fails with
    /// [`ClientError::DuplicateCorrelationId`] if that id is already waiting and
    /// with [`ClientError::Timeout`] when no reply arrives in time.
    #[instrument(skip(self, request), fields(phones = request.phones.len()))]
    pub async fn call(&self, request: ReportRequest) -> Result<ReplyEnvelope> {
        let correlation_id = request
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let body = request.to_vec()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&correlation_id) {
                return Err(ClientError::DuplicateCorrelationId(correlation_id));
            }
            pending.insert(correlation_id.clone(), reply_tx);
        }
        let _slot = PendingSlot {
            pending: &self.pending,
            correlation_id: &correlation_id,
        };

        let message = Message::json(body)
            .with_correlation_id(correlation_id.as_str())
            .with_reply_to(self.reply_queue.as_str());
        self.broker
            .publish(&self.config.report_queue, message)
            .await?;

        info!(
            correlation_id = %correlation_id,
            phones = ?request.phones,
            "Sent report request"
        );

        let reply = match timeout(self.config.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(ClientError::Disconnected),
            Err(_) => {
                warn!(correlation_id = %correlation_id, "Report request timed out");
                return Err(ClientError::Timeout(self.config.request_timeout));
            }
        };

        let envelope = ReplyEnvelope::from_slice(&reply.body)?;
        debug!(
            correlation_id = %correlation_id,
            status = ?envelope.status,
            entries = envelope.data.len(),
            "Received reply"
        );
        Ok(envelope)
    }

    /// Stop routing replies and delete the reply queue
    ///
    /// Calls still waiting fail with [`ClientError::Disconnected`]. Dropping the
    /// client without closing it deletes the queue from a background task.
    pub async fn close(mut self) -> Result<()> {
        self.broker.delete_queue(&self.reply_queue).await?;
        self.closed = true;
        info!(reply_queue = %self.reply_queue, "Report client closed");
        Ok(())
    }
}

impl Drop for ReportClient {
    fn drop(&mut self) {
        self.dispatcher.abort();
        if self.closed {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(reply_queue = %self.reply_queue, "No runtime to delete reply queue");
            return;
        };
        let broker = Arc::clone(&self.broker);
        let reply_queue = std::mem::take(&mut self.reply_queue);
        runtime.spawn(async move {
            if let Err(e) = broker.delete_queue(&reply_queue).await {
                debug!(reply_queue = %reply_queue, "Reply queue already gone: {}", e);
            }
        });
    }
}

/// Removes a call's correlation entry when the call ends
struct PendingSlot<'a> {
    pending: &'a Mutex<HashMap<String, oneshot::Sender<Message>>>,
    correlation_id: &'a str,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(self.correlation_id);
    }
}

async fn dispatch_replies(mut subscription: Subscription, pending: PendingReplies) {
    while let Some(message) = subscription.next().await {
        let Some(correlation_id) = reply_correlation_id(&message) else {
            warn!(
                reply_queue = subscription.queue(),
                "Dropping reply without correlation id"
            );
            continue;
        };

        let waiter = pending.lock().remove(&correlation_id);
        match waiter {
            Some(reply_tx) => {
                if reply_tx.send(message).is_err() {
                    debug!(correlation_id = %correlation_id, "Caller left before its reply arrived");
                }
            }
            None => {
                warn!(correlation_id = %correlation_id, "Dropping reply for unknown correlation id");
            }
        }
    }

    debug!(reply_queue = subscription.queue(), "Reply queue closed");
    pending.lock().clear();
}

/// Correlation id from message metadata, else from the reply body
fn reply_correlation_id(message: &Message) -> Option<String> {
    #[derive(Deserialize)]
    struct CorrelationProbe {
        correlation_id: String,
    }

    if let Some(id) = message.correlation_id() {
        return Some(id.to_string());
    }
    serde_json::from_slice::<CorrelationProbe>(&message.body)
        .ok()
        .map(|probe| probe.correlation_id)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cdrstat_broker::InMemoryBroker;
    use cdrstat_core::{PhoneAccumulator, DEFAULT_REPORT_QUEUE};

    use super::*;

    fn echo_reply(request: &Message) -> Message {
        let correlation_id = request.correlation_id().unwrap_or_default().to_string();
        let phones = ReportRequest::from_slice(&request.body).unwrap().phones;
        let data = phones
            .into_iter()
            .map(|phone| PhoneAccumulator::new().finalize(phone))
            .collect();
        let envelope =
            ReplyEnvelope::complete(correlation_id.clone(), "2024-05-15 10:00:00", data, 0.0);
        Message::json(envelope.to_vec().unwrap()).with_correlation_id(correlation_id)
    }

    /// Answers every request; batches of `batch` requests are answered in reverse
    fn spawn_responder(broker: Arc<InMemoryBroker>, batch: usize) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut requests = broker.subscribe(DEFAULT_REPORT_QUEUE).await.unwrap();
            let mut held = Vec::new();
            while let Some(request) = requests.next().await {
                held.push(request);
                if held.len() < batch {
                    continue;
                }
                for request in held.drain(..).rev() {
                    let reply_to = request.reply_to().unwrap().to_string();
                    broker.publish(&reply_to, echo_reply(&request)).await.unwrap();
                }
            }
        })
    }

    async fn setup(request_timeout: Duration) -> (Arc<InMemoryBroker>, ReportClient) {
        let broker = Arc::new(InMemoryBroker::new());
        broker.declare_queue(DEFAULT_REPORT_QUEUE).await.unwrap();
        let config = ClientConfig::default().with_request_timeout(request_timeout);
        let client = ReportClient::connect(broker.clone(), config).await.unwrap();
        (broker, client)
    }

    #[tokio::test]
    async fn test_call_receives_its_reply() {
        let (broker, client) = setup(Duration::from_secs(5)).await;
        let _responder = spawn_responder(broker, 1);

        let reply = client
            .call(ReportRequest::new(vec![3, 1]).with_correlation_id("req-1"))
            .await
            .unwrap();

        assert_eq!(reply.correlation_id, "req-1");
        assert!(reply.is_complete());
        assert!(reply.get(3).is_some());
        assert!(reply.get(1).is_some());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_isolated() {
        let (broker, client) = setup(Duration::from_secs(5)).await;
        let _responder = spawn_responder(broker, 3);

        let (a, b, c) = tokio::join!(
            client.call_phones(vec![1]),
            client.call_phones(vec![2]),
            client.call_phones(vec![3]),
        );

        for (reply, phone) in [(a, 1), (b, 2), (c, 3)] {
            let reply = reply.unwrap();
            assert_eq!(reply.data.len(), 1);
            assert_eq!(reply.data[0].phone, phone);
        }
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_generated_correlation_ids_are_distinct() {
        let (broker, client) = setup(Duration::from_secs(5)).await;
        let _responder = spawn_responder(broker, 2);

        let (a, b) = tokio::join!(client.call_phones(vec![1]), client.call_phones(vec![1]));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.correlation_id, b.correlation_id);
        assert_eq!(a.correlation_id.len(), 32);
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let (_broker, client) = setup(Duration::from_millis(50)).await;

        let result = client.call_phones(vec![1]).await;

        match result {
            Err(ClientError::Timeout(waited)) => assert_eq!(waited, Duration::from_millis(50)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_late_reply_is_dropped() {
        let (broker, client) = setup(Duration::from_millis(50)).await;
        let mut requests = broker.subscribe(DEFAULT_REPORT_QUEUE).await.unwrap();

        assert!(client.call_phones(vec![1]).await.is_err());

        let stale = requests.next().await.unwrap();
        broker
            .publish(client.reply_queue(), echo_reply(&stale))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_correlation_id_rejected() {
        let (_broker, client) = setup(Duration::from_millis(100)).await;

        let (first, second) = tokio::join!(
            client.call(ReportRequest::new(vec![1]).with_correlation_id("same")),
            client.call(ReportRequest::new(vec![2]).with_correlation_id("same")),
        );

        assert!(matches!(first, Err(ClientError::Timeout(_))));
        match second {
            Err(ClientError::DuplicateCorrelationId(id)) => assert_eq!(id, "same"),
            other => panic!("expected duplicate id, got {other:?}"),
        }
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_call_cleans_up() {
        let (_broker, client) = setup(Duration::from_secs(30)).await;

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), client.call_phones(vec![1])).await;

        assert!(cancelled.is_err());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_reply_does_not_disturb_calls() {
        let (broker, client) = setup(Duration::from_secs(5)).await;
        broker
            .publish(
                client.reply_queue(),
                Message::json(r#"{"status":"Complete"}"#).with_correlation_id("nobody"),
            )
            .await
            .unwrap();
        broker
            .publish(client.reply_queue(), Message::new("not json"))
            .await
            .unwrap();
        let _responder = spawn_responder(broker, 1);

        let reply = client.call_phones(vec![4]).await.unwrap();
        assert_eq!(reply.data[0].phone, 4);
    }

    #[tokio::test]
    async fn test_correlation_id_read_from_body() {
        let (broker, client) = setup(Duration::from_secs(5)).await;
        let responder_broker = broker.clone();
        let _responder = tokio::spawn(async move {
            let mut requests = responder_broker
                .subscribe(DEFAULT_REPORT_QUEUE)
                .await
                .unwrap();
            let request = requests.next().await.unwrap();
            let mut reply = echo_reply(&request);
            reply.properties.correlation_id = None;
            responder_broker
                .publish(request.reply_to().unwrap(), reply)
                .await
                .unwrap();
        });

        let reply = client
            .call(ReportRequest::new(vec![9]).with_correlation_id("in-body"))
            .await
            .unwrap();
        assert_eq!(reply.correlation_id, "in-body");
    }

    #[tokio::test]
    async fn test_publish_failure_is_transport_error() {
        let broker = Arc::new(InMemoryBroker::new());
        let client = ReportClient::connect(broker, ClientConfig::default())
            .await
            .unwrap();

        let err = client.call_phones(vec![1]).await.unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert!(err.is_retryable());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_without_close_deletes_reply_queue() {
        let (broker, client) = setup(Duration::from_secs(5)).await;
        let reply_queue = client.reply_queue().to_string();
        assert_eq!(broker.queue_count().await, 2);

        drop(client);

        tokio::time::timeout(Duration::from_secs(5), async {
            while broker.queue_count().await > 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(broker.delete_queue(&reply_queue).await.is_err());
        assert!(broker.delete_queue(DEFAULT_REPORT_QUEUE).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_deletes_reply_queue() {
        let (broker, client) = setup(Duration::from_secs(5)).await;
        let reply_queue = client.reply_queue().to_string();

        client.close().await.unwrap();

        assert!(broker.delete_queue(&reply_queue).await.is_err());
        assert_eq!(broker.queue_count().await, 1);
    }
}
