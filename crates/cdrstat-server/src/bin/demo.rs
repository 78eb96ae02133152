//! cdrstat Demo
//!
//! Runs the report service and a report client against one in-process broker,
//! sends four report requests concurrently, and prints every reply.
//!
//! ## Configuration
//! The service reads its usual environment variables (see `ServiceConfig`).
//! When `PHONE_DATA_STORAGE_PATH` does not exist, a sample store is generated
//! there first:
//! - `DEMO_PHONE_COUNT`: phones in the generated store (default: 25)
//!
//! The client reads `REPORT_TIMEOUT_SECS` (default: 30).
//!
//! ## Example Usage
//! ```bash
//! ONE_PHONE_RECORDS_COUNT=1000 PHONE_DATA_STORAGE_PATH=./data/demo.json \
//!     cargo run -p cdrstat-server --bin cdrstat-demo
//! ```

use std::sync::Arc;

use cdrstat_client::{ClientConfig, ReportClient};
use cdrstat_core::CallRecord;
use cdrstat_server::{ReportService, ServiceConfig};
use cdrstat_storage::{StoreLayout, StoreWriter, DEFAULT_BASE_WIDTH};
use futures::future::join_all;

/// First call of the generated data set: 2023-05-15 00:00:00 UTC
const SAMPLE_EPOCH_MS: i64 = 1_684_108_800_000;

/// Deterministic sample record `n` of `phone`
fn sample_record(phone: u64, n: u64) -> CallRecord {
    let seed = phone.wrapping_mul(7_919).wrapping_add(n.wrapping_mul(104_729));
    let start = SAMPLE_EPOCH_MS + (n as i64) * 90_000;
    let duration = (seed % 60) as i64;
    let price = (seed % 30) as f64;
    CallRecord::new(phone, start, start + duration, price)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;

    if !config.store.path.exists() {
        let phone_count: u64 = std::env::var("DEMO_PHONE_COUNT")
            .unwrap_or_else(|_| "25".to_string())
            .parse()?;
        let layout = StoreLayout::new(
            config.store.records_per_phone,
            config.store.base_width.unwrap_or(DEFAULT_BASE_WIDTH),
        );
        tracing::info!(
            "Generating sample store at {} ({} phones, {} records each)",
            config.store.path.display(),
            phone_count,
            layout.records_per_phone
        );
        StoreWriter::new(layout)
            .write_file(&config.store.path, phone_count, sample_record)
            .await?;
    }

    tracing::info!("Initializing report generation service...");
    let broker = cdrstat_broker::connect(&config.broker_host)?;
    let report_queue = config.report_queue.clone();
    let service = Arc::new(ReportService::new(broker.clone(), config).await?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let service_handle = service.start(shutdown_rx).await?;

    let client_config = ClientConfig::from_env()?.with_report_queue(report_queue);
    let client = ReportClient::connect(broker, client_config).await?;

    let sample_tasks: Vec<Vec<u64>> = vec![
        vec![1, 2, 3, 4, 5],
        vec![6, 7, 8, 9, 10],
        vec![11, 12, 13, 14, 15],
        vec![16, 17, 18, 19, 20],
    ];

    let replies = join_all(
        sample_tasks
            .into_iter()
            .map(|phones| client.call_phones(phones)),
    )
    .await;

    for reply in replies {
        match reply {
            Ok(reply) => println!("Received reply: {}", serde_json::to_string(&reply)?),
            Err(e) => tracing::error!("Report request failed: {}", e),
        }
    }

    tracing::info!("Tasks completed.");

    client.close().await?;
    let _ = shutdown_tx.send(());
    service_handle.await?;

    Ok(())
}
