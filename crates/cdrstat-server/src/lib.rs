//! cdrstat Server - the report service worker
//!
//! [`ReportService`] consumes report requests from a broker queue and answers
//! each with per-phone call statistics read from the record store.
//!
//! ## Configuration
//! All configuration comes from environment variables; see [`ServiceConfig`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cdrstat_server::{ReportService, ServiceConfig};
//!
//! let config = ServiceConfig::from_env()?;
//! let broker = cdrstat_broker::connect(&config.broker_host)?;
//! let service = Arc::new(ReportService::new(broker, config).await?);
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
//! let handle = service.start(shutdown_rx).await?;
//! ```

pub mod config;
pub mod error;
pub mod service;

pub use config::{ScanMode, ServiceConfig};
pub use error::{Result, ServiceError};
pub use service::ReportService;
