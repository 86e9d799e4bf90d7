//! Error types for Scrapeflow.
//!
//! All fallible engine operations return `ScrapeflowError`. Failures of a single outbound call never
//! surface here: they are normalized into a failed [`CallResult`](crate::CallResult) instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Scrapeflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ScrapeflowError {
    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, CSV, urlencoded).
    #[error("{0}")]
    Convert(String),

    /// Storage operation errors, including missing records.
    #[error("{0}")]
    Store(String),

    /// Template lookup or definition errors.
    #[error("{0}")]
    Template(String),

    /// Workflow definition errors.
    #[error("{0}")]
    Workflow(String),

    /// Batch task definition or bookkeeping errors.
    #[error("{0}")]
    Batch(String),

    /// HTTP client construction errors.
    #[error("{0}")]
    Http(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl From<std::io::Error> for ScrapeflowError {
    fn from(error: std::io::Error) -> Self {
        ScrapeflowError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for ScrapeflowError {
    fn from(error: serde_json::Error) -> Self {
        ScrapeflowError::Convert(error.to_string())
    }
}

impl From<csv::Error> for ScrapeflowError {
    fn from(error: csv::Error) -> Self {
        ScrapeflowError::Convert(format!("invalid csv: {}", error))
    }
}

impl From<jsonschema::ValidationError<'_>> for ScrapeflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        ScrapeflowError::Workflow(error.to_string())
    }
}

impl From<reqwest::Error> for ScrapeflowError {
    fn from(error: reqwest::Error) -> Self {
        ScrapeflowError::Http(error.to_string())
    }
}
