//! Tiered cost-center classifier.
//!
//! Operation type comes from the CFOP of the first item. The cost center is
//! resolved by the first tier that answers: issuer-name pattern, NCM mapping,
//! cache, LLM fallback, generic fallback.

pub mod cache;
pub mod cfop;
pub mod engine;
pub mod llm;
pub mod tables;

pub use cache::{CacheEntry, CacheKey, CacheStats, ClassificationCache, MemoryCache};
pub use cfop::operation_type;
pub use engine::Classifier;
pub use llm::LlmGate;
