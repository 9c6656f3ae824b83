//! Completion backend implementations.

#[cfg(feature = "http")]
pub mod http;

pub mod scripted;

use async_trait::async_trait;

use crate::{CompletionRequest, Result};

/// Trait for LLM completion backends.
///
/// This trait abstracts over the provider actually answering the prompt, so
/// the classifier can run against a real endpoint in production and against
/// a deterministic script in tests.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Request a completion and return the raw reply text.
    ///
    /// Implementations must not retry on their own; the caller owns timeout
    /// and fallback policy.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Short backend identifier used in logs.
    fn name(&self) -> &str;
}
