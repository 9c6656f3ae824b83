//! Error types for the LLM layer.

use thiserror::Error;

/// Errors that can occur while requesting a completion.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Backend is missing configuration (endpoint, API key, ...).
    #[error("backend not configured: {0}")]
    Configuration(String),

    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider response could not be decoded.
    #[error("invalid response: {0}")]
    Response(String),

    /// The provider answered without any completion text.
    #[error("empty completion")]
    EmptyResponse,
}
