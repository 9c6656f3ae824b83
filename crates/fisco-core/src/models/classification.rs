//! Classification result model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Nature of the fiscal operation, derived from CFOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Purchase,
    Sale,
    Transfer,
    Return,
    Unknown,
}

impl OperationType {
    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Purchase => "purchase",
            OperationType::Sale => "sale",
            OperationType::Transfer => "transfer",
            OperationType::Return => "return",
            OperationType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier tier that produced a cost center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    IssuerPattern,
    NcmMapping,
    Cache,
    Llm,
    Fallback,
}

impl Tier {
    /// Confidence assigned to a cost center resolved by this tier.
    ///
    /// Cache hits keep the confidence of the tier that originally resolved
    /// them, so `Cache` has no confidence of its own.
    pub fn confidence(&self) -> Option<f32> {
        match self {
            Tier::IssuerPattern => Some(0.90),
            Tier::NcmMapping => Some(0.85),
            Tier::Llm => Some(0.70),
            Tier::Fallback => Some(0.30),
            Tier::Cache => None,
        }
    }

    /// Label used in reasoning strings.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::IssuerPattern => "issuer-name pattern",
            Tier::NcmMapping => "NCM mapping",
            Tier::Cache => "cache",
            Tier::Llm => "LLM fallback",
            Tier::Fallback => "generic fallback",
        }
    }
}

/// Output of the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Operation type from the CFOP rule.
    pub operation_type: OperationType,

    /// Cost-center label.
    pub cost_center: String,

    /// Confidence in [0, 1], tied to the resolving tier.
    pub confidence: f32,

    /// Which tier resolved the cost center and what matched.
    pub reasoning: String,

    /// True iff the LLM tier resolved the cost center.
    pub used_llm_fallback: bool,
}
