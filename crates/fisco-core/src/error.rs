//! Error types for the fisco-core library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the fisco library.
#[derive(Error, Debug)]
pub enum FiscoError {
    /// Fiscal document could not be normalized.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Classification cache failure.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// LLM backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] fisco_llm::LlmError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while turning raw XML into an [`Invoice`](crate::Invoice).
///
/// Any of these is fatal for the document: no partial invoice is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The XML is not well-formed.
    #[error("malformed XML: {0}")]
    Xml(String),

    /// The document carries a DTD. External entities are never expanded.
    #[error("DOCTYPE declarations are not accepted")]
    DoctypeForbidden,

    /// The document type could not be determined or is not supported.
    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),

    /// A required field is absent.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A numeric field is not a valid decimal.
    #[error("invalid decimal in {field}: {value:?}")]
    InvalidDecimal { field: String, value: String },

    /// A date field is not a valid date.
    #[error("invalid date in {field}: {value:?}")]
    InvalidDate { field: String, value: String },
}

/// Reasons the LLM tier did not produce a cost center.
///
/// Recovered inside the classifier by falling through to the generic
/// fallback; never returned to callers of `classify`.
#[derive(Error, Debug)]
pub enum ClassificationFailure {
    /// No backend is configured.
    #[error("LLM fallback disabled")]
    Disabled,

    /// The batch was cancelled before the call started.
    #[error("LLM calls cancelled")]
    Cancelled,

    /// The backend did not answer in time.
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    /// Transport or provider error.
    #[error("LLM backend failed: {0}")]
    Backend(#[from] fisco_llm::LlmError),

    /// The reply did not match any known label.
    #[error("unparseable LLM reply: {0:?}")]
    Unparseable(String),
}

/// Errors raised by a classification cache store.
///
/// The classifier treats every cache error as a miss.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The store cannot be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// The store returned data that cannot be decoded.
    #[error("cache corrupted: {0}")]
    Corrupted(String),
}

/// Why a document in a batch produced no result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The document could not be normalized.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The batch was cancelled before the document started.
    #[error("not processed: batch cancelled")]
    Cancelled,

    /// The worker task died.
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Result type for the fisco library.
pub type Result<T> = std::result::Result<T, FiscoError>;
