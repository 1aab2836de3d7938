//! Custom error types for refgen.
//!
//! Library functions return `Result<T, RefgenError>`. Per-identifier failures
//! are surfaced as errors and counted by the pipeline; only configuration and
//! output I/O errors abort a run.

use thiserror::Error;

/// Main error type for refgen operations.
#[derive(Debug, Error)]
pub enum RefgenError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from API
        message: String,
    },

    /// Identifier is not a PubMed ID
    #[error("Invalid PMID: {0:?}")]
    InvalidPmid(String),

    /// Upstream has no record for the identifier
    #[error("No record found for PMID {0}")]
    NotFound(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `RefgenError`
pub type Result<T> = std::result::Result<T, RefgenError>;

impl From<quick_xml::Error> for RefgenError {
    fn from(e: quick_xml::Error) -> Self {
        RefgenError::Parse(format!("XML: {}", e))
    }
}
