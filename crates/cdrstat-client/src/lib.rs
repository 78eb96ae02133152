//! cdrstat Client - request/reply over the report queue
//!
//! [`ReportClient`] publishes report requests and waits for the matching reply.
//! Many calls can share one client concurrently; each is correlated by id and
//! bounded by a timeout.
//!
//! ## Example
//!
//! ```ignore
//! use cdrstat_broker::connect;
//! use cdrstat_client::{ClientConfig, ReportClient};
//!
//! let broker = connect("memory")?;
//! let client = ReportClient::connect(broker, ClientConfig::from_env()?).await?;
//!
//! let reply = client.call_phones(vec![1, 2, 3]).await?;
//! for entry in &reply.data {
//!     println!("{}: {} attempts", entry.phone, entry.attempt_count);
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::ReportClient;
pub use config::{ClientConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ClientError, Result};
