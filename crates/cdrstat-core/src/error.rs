//! Error Types for cdrstat Core
//!
//! ## Error Categories
//!
//! ### Serialization Errors
//! - `Serialization`: a request or reply body is not valid JSON for its shape
//!
//! ## Usage
//! All functions in this crate return `Result<T>`, aliased to `Result<T, Error>`,
//! so callers can propagate with `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
