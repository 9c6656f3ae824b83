//! Configuration structures for the fisco pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FiscoError, Result};

/// Main configuration for the fisco pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FiscoConfig {
    /// Validation engine configuration.
    pub validation: ValidationConfig,

    /// Classifier configuration.
    pub classifier: ClassifierConfig,

    /// LLM fallback configuration.
    pub llm: LlmConfig,

    /// Batch processing configuration.
    pub batch: BatchConfig,
}

/// Validation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Absolute tolerance for monetary comparisons.
    pub tolerance: Decimal,

    /// Names of built-in rules to leave out of the registry.
    pub disabled_rules: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(2, 2),
            disabled_rules: Vec::new(),
        }
    }
}

/// Issuer-name keywords mapped to a cost center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerPattern {
    /// Keywords matched as whole words against the folded issuer name.
    pub keywords: Vec<String>,
    /// Cost center assigned on match.
    pub cost_center: String,
}

/// NCM prefix mapped to a cost center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NcmMapping {
    /// NCM prefix (2 to 8 digits).
    pub prefix: String,
    /// Cost center assigned on match.
    pub cost_center: String,
}

/// Classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Issuer-name pattern table.
    pub issuer_patterns: Vec<IssuerPattern>,

    /// NCM prefix table.
    pub ncm_mappings: Vec<NcmMapping>,

    /// Cost center of the generic fallback.
    pub fallback_cost_center: String,

    /// Labels the LLM may answer besides those in the tables.
    pub extra_labels: Vec<String>,

    /// JSON snapshot file backing the classification cache.
    pub cache_path: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            issuer_patterns: default_issuer_patterns(),
            ncm_mappings: default_ncm_mappings(),
            fallback_cost_center: "Não Classificado".to_string(),
            extra_labels: vec![
                "Marketing - Publicidade".to_string(),
                "Serviços - Consultoria".to_string(),
            ],
            cache_path: None,
        }
    }
}

impl ClassifierConfig {
    /// Every cost center the classifier can assign, excluding the fallback.
    pub fn known_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        let candidates = self
            .issuer_patterns
            .iter()
            .map(|p| &p.cost_center)
            .chain(self.ncm_mappings.iter().map(|m| &m.cost_center))
            .chain(self.extra_labels.iter());

        for label in candidates {
            if label != &self.fallback_cost_center && !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels
    }
}

fn pattern(keywords: &[&str], cost_center: &str) -> IssuerPattern {
    IssuerPattern {
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        cost_center: cost_center.to_string(),
    }
}

fn ncm(prefix: &str, cost_center: &str) -> NcmMapping {
    NcmMapping {
        prefix: prefix.to_string(),
        cost_center: cost_center.to_string(),
    }
}

fn default_issuer_patterns() -> Vec<IssuerPattern> {
    vec![
        pattern(
            &["MAGAZINE LUIZA", "KABUM", "DELL", "LENOVO", "POSITIVO TECNOLOGIA"],
            "TI - Equipamentos",
        ),
        pattern(
            &["TELEFONICA", "VIVO", "CLARO", "TIM", "OI"],
            "TI - Telecomunicações",
        ),
        pattern(
            &["KALUNGA", "PAPELARIA"],
            "Administrativo - Material de Escritório",
        ),
        pattern(
            &["PETROBRAS", "POSTO", "IPIRANGA", "SHELL", "RAIZEN"],
            "Logística - Combustível",
        ),
        pattern(
            &["SABESP", "CEMIG", "ENEL", "COPEL"],
            "Administrativo - Utilidades",
        ),
        pattern(
            &["DROGASIL", "DROGARIA", "FARMACIA"],
            "RH - Saúde e Benefícios",
        ),
    ]
}

fn default_ncm_mappings() -> Vec<NcmMapping> {
    vec![
        ncm("8471", "TI - Equipamentos"),
        ncm("8473", "TI - Equipamentos"),
        ncm("8517", "TI - Telecomunicações"),
        ncm("2710", "Logística - Combustível"),
        ncm("4802", "Administrativo - Material de Escritório"),
        ncm("4820", "Administrativo - Material de Escritório"),
        ncm("9608", "Administrativo - Material de Escritório"),
        ncm("9401", "Infraestrutura - Mobiliário"),
        ncm("9403", "Infraestrutura - Mobiliário"),
        ncm("8415", "Infraestrutura - Manutenção"),
        ncm("3004", "RH - Saúde e Benefícios"),
        ncm("0901", "Administrativo - Copa e Cozinha"),
        ncm("2201", "Administrativo - Copa e Cozinha"),
    ]
}

/// LLM fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Use the LLM tier at all.
    pub enabled: bool,

    /// OpenAI-compatible chat completions URL.
    pub endpoint: String,

    /// Model identifier.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum concurrent LLM calls.
    pub max_concurrent: usize,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum reply tokens.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "FISCO_LLM_API_KEY".to_string(),
            timeout_secs: 30,
            max_concurrent: 4,
            temperature: 0.0,
            max_tokens: 32,
        }
    }
}

impl LlmConfig {
    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of documents processed concurrently.
    pub jobs: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

impl FiscoConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn check(&self) -> Result<()> {
        if self.validation.tolerance.is_sign_negative() {
            return Err(FiscoError::Config(
                "validation.tolerance must not be negative".to_string(),
            ));
        }
        if self.llm.max_concurrent == 0 {
            return Err(FiscoError::Config(
                "llm.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.batch.jobs == 0 {
            return Err(FiscoError::Config("batch.jobs must be at least 1".to_string()));
        }
        if self.classifier.fallback_cost_center.trim().is_empty() {
            return Err(FiscoError::Config(
                "classifier.fallback_cost_center must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
