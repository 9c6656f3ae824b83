//! Core library for Brazilian fiscal documents.
//!
//! This crate provides:
//! - XML normalization of NF-e, NFC-e, CT-e and MDF-e into a canonical model
//! - A rule registry and validation engine with decimal tolerance checks
//! - Operation-type and cost-center classification with a result cache and
//!   an optional LLM fallback
//! - A batch pipeline combining the three

pub mod classifier;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{CacheKey, CacheStats, ClassificationCache, Classifier, MemoryCache};
pub use error::{CacheError, ClassificationFailure, DocumentError, FiscoError, ParseError, Result};
pub use models::classification::{ClassificationResult, OperationType, Tier};
pub use models::config::FiscoConfig;
pub use models::invoice::{DocumentType, Invoice, InvoiceHeader, InvoiceItem, InvoiceTotals, ItemTaxes, Party};
pub use models::issue::{Severity, ValidationIssue};
pub use normalizer::{DocumentNormalizer, NfeParser};
pub use pipeline::{BatchInput, BatchOutcome, BatchSummary, CancelHandle, Pipeline, ProcessedDocument};
pub use validation::{Rule, RuleContext, RuleRegistry, ValidationEngine};

/// Re-export LLM backend types.
pub use fisco_llm::{LlmBackend, LlmError, ScriptedBackend};

/// Parse raw XML into an [`Invoice`].
pub fn normalize(raw: &[u8]) -> std::result::Result<Invoice, ParseError> {
    normalizer::normalize(raw)
}

/// Validate with the built-in rules and default tolerance.
pub fn validate(invoice: &Invoice) -> Vec<ValidationIssue> {
    ValidationEngine::default().validate(invoice)
}
