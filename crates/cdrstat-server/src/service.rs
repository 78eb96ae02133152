//! Report Service
//!
//! Consumes report requests from the request queue, aggregates statistics for
//! the requested phones, and publishes one reply per request to the queue named
//! in the request's `reply_to`, tagged with the request's correlation id.
//!
//! ## Request Flow
//!
//! ```text
//! report_queue ──▶ start() loop ──spawn──▶ handle_delivery()
//!                                              │
//!                                              ├─ decode ReportRequest
//!                                              ├─ generate_report() / generate_report_full_scan()
//!                                              ├─ build ReplyEnvelope (Complete | Error)
//!                                              └─ publish to reply_to
//! ```
//!
//! Each delivery is handled on its own task, so a slow report never holds up
//! the requests behind it. A request that cannot be served still gets a reply
//! with status `Error`; a request without `reply_to` is logged and dropped.

use std::sync::Arc;
use std::time::Instant;

use cdrstat_broker::{Broker, Message};
use cdrstat_core::{
    Aggregator, BlockFold, CallRecord, PhoneStatistics, ReplyEnvelope, ReportRequest,
    TASK_RECEIVED_FORMAT,
};
use cdrstat_storage::{
    decode_block, scan_store, RecordLocator, RecordStore, StoreLayout, DEFAULT_BASE_WIDTH,
};
use chrono::Local;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ScanMode, ServiceConfig};
use crate::error::{Result, ServiceError};

pub struct ReportService {
    broker: Arc<dyn Broker>,
    store: RecordStore,
    locator: RecordLocator,
    config: ServiceConfig,
}

impl ReportService {
    /// Open the configured record store and derive its layout
    ///
    /// In full-scan mode the store is never calibrated; an unset base width
    /// falls back to [`DEFAULT_BASE_WIDTH`].
    pub async fn new(broker: Arc<dyn Broker>, config: ServiceConfig) -> Result<Self> {
        let store = RecordStore::open(&config.store.path).await?;
        let locator = match config.scan_mode {
            ScanMode::Indexed => RecordLocator::from_config(&store, &config.store).await?,
            ScanMode::Full => RecordLocator::new(StoreLayout::new(
                config.store.records_per_phone,
                config.store.base_width.unwrap_or(DEFAULT_BASE_WIDTH),
            )),
        };

        info!(
            path = %config.store.path.display(),
            records_per_phone = locator.layout().records_per_phone,
            base_width = locator.layout().base_width,
            scan_mode = %config.scan_mode,
            "Record store opened"
        );

        Ok(Self::with_parts(broker, store, locator, config))
    }

    pub fn with_parts(
        broker: Arc<dyn Broker>,
        store: RecordStore,
        locator: RecordLocator,
        config: ServiceConfig,
    ) -> Self {
        Self {
            broker,
            store,
            locator,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Start consuming the request queue
    ///
    /// The queue is declared and subscribed before this returns, so requests
    /// published afterwards are never missed. The returned task runs until
    /// `shutdown_rx` fires or the queue is deleted.
    pub async fn start(self: Arc<Self>, shutdown_rx: oneshot::Receiver<()>) -> Result<JoinHandle<()>> {
        let queue = self.config.report_queue.clone();
        self.broker.declare_queue(&queue).await?;
        let mut requests = self.broker.subscribe(&queue).await?;

        info!(queue = %queue, "Report service started, awaiting tasks");

        Ok(tokio::spawn(async move {
            let mut shutdown_rx = shutdown_rx;
            loop {
                tokio::select! {
                    delivery = requests.next() => {
                        let Some(message) = delivery else {
                            info!(queue = %queue, "Request queue closed");
                            break;
                        };
                        let service = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = service.handle_delivery(message).await {
                                warn!("Request not answered: {}", e);
                            }
                        });
                    }
                    _ = &mut shutdown_rx => {
                        info!("Report service shutting down");
                        break;
                    }
                }
            }
        }))
    }

    /// Process one request message and publish its reply
    ///
    /// Returns the reply that was published.
    #[instrument(skip(self, message), fields(correlation_id = message.correlation_id().unwrap_or("")))]
    pub async fn handle_delivery(&self, message: Message) -> Result<ReplyEnvelope> {
        let task_received = Local::now();
        let started = Instant::now();
        let correlation_id = message.correlation_id().unwrap_or_default().to_string();

        info!("Received new task");

        let outcome = match ReportRequest::from_slice(&message.body) {
            Ok(request) => {
                info!(phones = ?request.phones, "Generating report");
                self.build_report(&request).await
            }
            Err(e) => Err(e.into()),
        };

        let task_received = task_received.format(TASK_RECEIVED_FORMAT).to_string();
        let total_duration = started.elapsed().as_secs_f64();
        let reply = match outcome {
            Ok(data) => {
                info!(entries = data.len(), total_duration, "Report generated");
                ReplyEnvelope::complete(correlation_id.as_str(), task_received, data, total_duration)
            }
            Err(e) => {
                warn!(error = %e, "Report failed");
                ReplyEnvelope::failed(
                    correlation_id.as_str(),
                    task_received,
                    e.to_string(),
                    total_duration,
                )
            }
        };

        let Some(reply_to) = message.reply_to() else {
            warn!("Request has no reply_to; dropping reply");
            return Err(ServiceError::MissingReplyTo(correlation_id));
        };

        let body = reply.to_vec()?;
        let reply_message = Message::json(body).with_correlation_id(correlation_id.as_str());
        if let Err(e) = self.broker.publish(reply_to, reply_message).await {
            error!(reply_to = %reply_to, "Failed to publish reply: {}", e);
            return Err(e.into());
        }

        info!(reply_to = %reply_to, "Sent response");
        Ok(reply)
    }

    async fn build_report(&self, request: &ReportRequest) -> Result<Vec<PhoneStatistics>> {
        match self.config.scan_mode {
            ScanMode::Indexed => self.generate_report(&request.phones).await,
            ScanMode::Full => self.generate_report_full_scan(&request.phones).await,
        }
    }

    /// Aggregate statistics by reading only the requested phones' blocks
    ///
    /// Every distinct requested phone gets an entry. A block that cannot be
    /// located or decoded yields a zero-attempt entry instead of failing the
    /// whole report; I/O failures fail the report.
    pub async fn generate_report(&self, phones: &[u64]) -> Result<Vec<PhoneStatistics>> {
        let phones = ReportRequest::new(phones.to_vec()).distinct_phones();
        let mut aggregator = Aggregator::new();

        for phone in phones {
            match self.read_block(phone).await {
                Ok(records) => match aggregator.fold_block(phone, &records) {
                    BlockFold::Folded { records, strays } => {
                        debug!(phone, records, "Folded block");
                        if strays > 0 {
                            warn!(phone, strays, "Block held records of other phones");
                        }
                    }
                    BlockFold::AlreadyFolded => {}
                },
                Err(e) if e.is_block_local() => {
                    warn!(phone, error = %e, "Unreadable block, reporting no attempts");
                    aggregator.track(phone);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(aggregator.finalize())
    }

    /// Aggregate statistics by streaming the whole store
    ///
    /// Phones with no matching records are absent from the result.
    pub async fn generate_report_full_scan(&self, phones: &[u64]) -> Result<Vec<PhoneStatistics>> {
        Ok(scan_store(&self.store, phones).await?.finalize())
    }

    async fn read_block(&self, phone: u64) -> cdrstat_storage::Result<Vec<CallRecord>> {
        let range = self.locator.locate(phone)?;
        let bytes = self.store.read_range(range).await?;
        decode_block(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cdrstat_broker::InMemoryBroker;
    use cdrstat_core::ReportStatus;
    use cdrstat_storage::StoreWriter;
    use tempfile::TempDir;

    use super::*;

    const PHONES: u64 = 6;
    const PER_PHONE: u64 = 4;
    const BASE: u64 = 90;

    /// Record `n` of any phone lasts `5 * (n + 1)` and costs `10 + 3 * n`
    fn record(phone: u64, n: u64) -> CallRecord {
        let start = 1_700_000_000_000 + (n as i64) * 60_000;
        CallRecord::new(phone, start, start + 5 * (n as i64 + 1), 10.0 + n as f64 * 3.0)
    }

    async fn service(scan_mode: ScanMode) -> (TempDir, Arc<InMemoryBroker>, ReportService) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("phones.json");
        let layout = StoreLayout::new(PER_PHONE, BASE);
        StoreWriter::new(layout)
            .write_file(&path, PHONES, record)
            .await
            .unwrap();

        let mut config = ServiceConfig::default();
        config.store.path = path;
        config.store.records_per_phone = PER_PHONE;
        config.store.base_width = Some(BASE);
        config.scan_mode = scan_mode;

        let broker = Arc::new(InMemoryBroker::new());
        let service = ReportService::new(broker.clone(), config).await.unwrap();
        (dir, broker, service)
    }

    fn request(body: &str, correlation_id: &str, reply_to: &str) -> Message {
        Message::json(body.to_string())
            .with_correlation_id(correlation_id)
            .with_reply_to(reply_to)
    }

    #[tokio::test]
    async fn test_generate_report_reads_requested_blocks() {
        let (_dir, _broker, service) = service(ScanMode::Indexed).await;

        let report = service.generate_report(&[4, 1, 4]).await.unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].phone, 1);
        assert_eq!(report[1].phone, 4);
        let phone1 = &report[0];
        assert_eq!(phone1.attempt_count, PER_PHONE);
        assert_eq!(phone1.duration_buckets.short, 2);
        assert_eq!(phone1.duration_buckets.medium, 2);
        assert_eq!(phone1.min_price, Some(10.0));
        assert_eq!(phone1.max_price, Some(19.0));
        assert_eq!(phone1.avg_duration, 12.5);
    }

    #[tokio::test]
    async fn test_corrupt_block_degrades_only_its_phone() {
        use std::io::{Seek, SeekFrom, Write};

        let (_dir, _broker, service) = service(ScanMode::Indexed).await;
        let range = service.locator.locate(2).unwrap();
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .open(service.store.path())
            .unwrap();
        file.seek(SeekFrom::Start(range.start)).unwrap();
        file.write_all(b"x").unwrap();
        drop(file);

        let report = service.generate_report(&[1, 2, 3]).await.unwrap();

        let counts: Vec<(u64, u64)> = report
            .iter()
            .map(|entry| (entry.phone, entry.attempt_count))
            .collect();
        assert_eq!(counts, vec![(1, PER_PHONE), (2, 0), (3, PER_PHONE)]);
        assert_eq!(report[1].min_price, None);
    }

    #[tokio::test]
    async fn test_full_scan_service_skips_calibration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("phones.json");
        std::fs::write(
            &path,
            r#"[{"phone": 1, "start_date": 0, "end_date": 4, "price": 3}]"#,
        )
        .unwrap();

        let mut config = ServiceConfig::default();
        config.store.path = path;
        config.scan_mode = ScanMode::Full;

        let broker = Arc::new(InMemoryBroker::new());
        let service = ReportService::new(broker, config).await.unwrap();
        let report = service.build_report(&ReportRequest::new(vec![1])).await.unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].attempt_count, 1);
        assert_eq!(report[0].duration_buckets.short, 1);
    }

    #[tokio::test]
    async fn test_indexed_service_requires_calibration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("phones.json");
        std::fs::write(&path, r#"[{"phone": 1, "start_date": 0, "end_date": 4}]"#).unwrap();

        let mut config = ServiceConfig::default();
        config.store.path = path;

        let broker = Arc::new(InMemoryBroker::new());
        let result = ReportService::new(broker, config).await;

        assert!(matches!(
            result,
            Err(ServiceError::Storage(cdrstat_storage::Error::Calibration(_)))
        ));
    }

    #[tokio::test]
    async fn test_indexed_matches_full_scan() {
        let (_dir, _broker, service) = service(ScanMode::Indexed).await;
        let phones = [0, 2, 3, 5];

        let indexed = service.generate_report(&phones).await.unwrap();
        let full = service.generate_report_full_scan(&phones).await.unwrap();

        assert_eq!(indexed, full);
    }

    #[tokio::test]
    async fn test_phone_outside_store_gets_empty_entry() {
        let (_dir, _broker, service) = service(ScanMode::Indexed).await;

        let indexed = service.generate_report(&[PHONES + 10]).await.unwrap();
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].attempt_count, 0);
        assert_eq!(indexed[0].min_price, None);
        assert_eq!(indexed[0].avg_duration, 0.0);

        let full = service
            .generate_report_full_scan(&[PHONES + 10])
            .await
            .unwrap();
        assert!(full.is_empty());
    }

    #[tokio::test]
    async fn test_handle_delivery_publishes_complete_reply() {
        let (_dir, broker, service) = service(ScanMode::Indexed).await;
        let reply_queue = broker.declare_exclusive_queue().await.unwrap();
        let mut replies = broker.subscribe(&reply_queue).await.unwrap();

        let returned = service
            .handle_delivery(request(r#"{"phones":[2,3]}"#, "corr-1", &reply_queue))
            .await
            .unwrap();

        let delivered = replies.next().await.unwrap();
        assert_eq!(delivered.correlation_id(), Some("corr-1"));
        let reply = ReplyEnvelope::from_slice(&delivered.body).unwrap();
        assert_eq!(reply, returned);
        assert_eq!(reply.status, ReportStatus::Complete);
        assert_eq!(reply.correlation_id, "corr-1");
        assert_eq!(reply.from, "report_service");
        assert_eq!(reply.to, "client");
        assert_eq!(reply.data.len(), 2);
        assert!(reply.total_duration >= 0.0);
        assert_eq!(reply.task_received.len(), "2024-05-15 10:00:00".len());
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_reply() {
        let (_dir, broker, service) = service(ScanMode::Indexed).await;
        let reply_queue = broker.declare_exclusive_queue().await.unwrap();
        let mut replies = broker.subscribe(&reply_queue).await.unwrap();

        service
            .handle_delivery(request(r#"{"numbers":[1]}"#, "corr-bad", &reply_queue))
            .await
            .unwrap();

        let reply = ReplyEnvelope::from_slice(&replies.next().await.unwrap().body).unwrap();
        assert_eq!(reply.status, ReportStatus::Error);
        assert_eq!(reply.correlation_id, "corr-bad");
        assert!(reply.data.is_empty());
        assert!(reply.error.is_some());
    }

    #[tokio::test]
    async fn test_missing_reply_to_is_dropped() {
        let (_dir, _broker, service) = service(ScanMode::Indexed).await;
        let message = Message::json(r#"{"phones":[1]}"#).with_correlation_id("orphan");

        let result = service.handle_delivery(message).await;

        assert!(matches!(result, Err(ServiceError::MissingReplyTo(id)) if id == "orphan"));
    }

    #[tokio::test]
    async fn test_publish_failure_is_returned() {
        let (_dir, _broker, service) = service(ScanMode::Indexed).await;

        let result = service
            .handle_delivery(request(r#"{"phones":[1]}"#, "corr-2", "amq.gen-gone"))
            .await;

        assert!(matches!(result, Err(ServiceError::Broker(_))));
    }

    #[tokio::test]
    async fn test_start_serves_until_shutdown() {
        let (_dir, broker, service) = service(ScanMode::Full).await;
        let reply_queue = broker.declare_exclusive_queue().await.unwrap();
        let mut replies = broker.subscribe(&reply_queue).await.unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = Arc::new(service).start(shutdown_rx).await.unwrap();

        broker
            .publish(
                "report_queue",
                request(r#"{"phones":[5]}"#, "corr-3", &reply_queue),
            )
            .await
            .unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(5), replies.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.correlation_id(), Some("corr-3"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
