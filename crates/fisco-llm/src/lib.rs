//! LLM completion abstraction layer for fisco.
//!
//! This crate provides a unified interface for asking a language model to
//! complete a short classification prompt:
//! - `HttpBackend` talks to any OpenAI-compatible chat completions endpoint
//! - `ScriptedBackend` replays canned replies for deterministic tests

mod backend;
mod error;
mod message;

pub use backend::LlmBackend;
pub use backend::scripted::ScriptedBackend;
pub use error::LlmError;
pub use message::{ChatMessage, CompletionRequest, Role};

#[cfg(feature = "http")]
pub use backend::http::{HttpBackend, HttpBackendConfig};

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;
