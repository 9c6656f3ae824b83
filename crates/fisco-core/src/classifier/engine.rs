//! Classifier tier cascade.

use std::sync::Arc;

use fisco_llm::LlmBackend;
use tracing::{debug, info, warn};

use super::cache::{CacheKey, ClassificationCache, MemoryCache};
use super::cfop::invoice_operation_type;
use super::llm::LlmGate;
use super::tables::{match_issuer, match_ncm};
use crate::error::{ClassificationFailure, Result};
use crate::models::classification::{ClassificationResult, OperationType, Tier};
use crate::models::config::{ClassifierConfig, FiscoConfig, LlmConfig};
use crate::models::invoice::Invoice;

/// Resolves invoices to an operation type and a cost center.
///
/// `classify` never fails: when no tier answers, the generic fallback label is
/// returned with the lowest confidence.
pub struct Classifier {
    config: ClassifierConfig,
    labels: Vec<String>,
    cache: Arc<dyn ClassificationCache>,
    llm: Option<LlmGate>,
}

impl Classifier {
    /// Classifier with a private in-memory cache and no LLM tier.
    pub fn new(config: ClassifierConfig) -> Self {
        let labels = config.known_labels();
        Self {
            config,
            labels,
            cache: Arc::new(MemoryCache::new()),
            llm: None,
        }
    }

    /// Classifier with the LLM tier configured from `config.llm`.
    ///
    /// The HTTP backend is only built when the tier is enabled and the API
    /// key variable is set; otherwise the tier is skipped.
    pub fn from_config(config: &FiscoConfig) -> Result<Self> {
        let classifier = Self::new(config.classifier.clone());
        if !config.llm.enabled {
            debug!("LLM fallback disabled by configuration");
            return Ok(classifier);
        }

        match http_backend(&config.llm)? {
            Some(backend) => Ok(classifier.with_backend(backend, &config.llm)),
            None => Ok(classifier),
        }
    }

    /// Share a cache with other classifiers or with the caller.
    pub fn with_cache(mut self, cache: Arc<dyn ClassificationCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Enable the LLM tier.
    pub fn with_backend(self, backend: Arc<dyn LlmBackend>, config: &LlmConfig) -> Self {
        self.with_llm(LlmGate::from_config(backend, config))
    }

    pub fn with_llm(mut self, gate: LlmGate) -> Self {
        info!("LLM fallback enabled using {}", gate.backend_name());
        self.llm = Some(gate);
        self
    }

    pub fn cache(&self) -> &Arc<dyn ClassificationCache> {
        &self.cache
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Labels the LLM may answer.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Stop starting LLM calls. Running calls finish; later invoices skip
    /// straight to the generic fallback.
    pub fn cancel(&self) {
        if let Some(llm) = &self.llm {
            llm.cancel();
        }
    }

    /// Resolve one invoice.
    ///
    /// A key resolved earlier by the issuer, NCM or LLM tier is served from
    /// the cache; only a first resolution walks the tiers. The generic
    /// fallback keeps the operation type derived from the CFOP and marks the
    /// document as unclassified through its cost center and confidence.
    pub async fn classify(&self, invoice: &Invoice) -> ClassificationResult {
        let operation_type = invoice_operation_type(invoice);
        let key = CacheKey::for_invoice(invoice);

        match self.cache.get(&key) {
            Ok(Some(cached)) => {
                debug!("Cache hit for {}", key);
                return cached;
            }
            Ok(None) => debug!("Cache miss for {}", key),
            Err(e) => warn!("Cache lookup for {} failed, bypassing: {}", key, e),
        }

        if let Some(hit) = match_issuer(&invoice.issuer.name, &self.config.issuer_patterns) {
            let result = resolved(
                operation_type,
                hit.cost_center,
                Tier::IssuerPattern,
                format!("keyword {:?} in issuer name {:?}", hit.keyword, invoice.issuer.name),
            );
            self.remember(key, &result);
            return result;
        }

        if let Some(hit) = match_ncm(invoice, &self.config.ncm_mappings) {
            let result = resolved(
                operation_type,
                hit.cost_center,
                Tier::NcmMapping,
                format!("NCM {} matches prefix {}", hit.ncm, hit.prefix),
            );
            self.remember(key, &result);
            return result;
        }

        let failure = match self.ask_llm(invoice).await {
            Ok(label) => {
                let result = resolved(
                    operation_type,
                    &label,
                    Tier::Llm,
                    format!("model answered {:?}", label),
                );
                self.remember(key, &result);
                return result;
            }
            Err(failure) => failure,
        };

        match &failure {
            ClassificationFailure::Disabled => {}
            other => warn!("LLM fallback for {} failed: {}", invoice.document_key, other),
        }

        resolved(
            operation_type,
            &self.config.fallback_cost_center,
            Tier::Fallback,
            format!("no tier matched ({})", failure),
        )
    }

    async fn ask_llm(&self, invoice: &Invoice) -> std::result::Result<String, ClassificationFailure> {
        match &self.llm {
            Some(llm) => llm.classify(invoice, &self.labels).await,
            None => Err(ClassificationFailure::Disabled),
        }
    }

    fn remember(&self, key: CacheKey, result: &ClassificationResult) {
        if let Err(e) = self.cache.put(key, result.clone()) {
            warn!("Could not cache classification: {}", e);
        }
    }
}

fn resolved(
    operation_type: OperationType,
    cost_center: &str,
    tier: Tier,
    detail: String,
) -> ClassificationResult {
    ClassificationResult {
        operation_type,
        cost_center: cost_center.to_string(),
        confidence: tier.confidence().unwrap_or_default(),
        reasoning: format!("{}: {}", tier.label(), detail),
        used_llm_fallback: tier == Tier::Llm,
    }
}

#[cfg(feature = "http")]
fn http_backend(config: &LlmConfig) -> Result<Option<Arc<dyn LlmBackend>>> {
    use fisco_llm::{HttpBackend, HttpBackendConfig};

    let api_key = match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!(
                "{} is not set, LLM fallback disabled",
                config.api_key_env
            );
            return Ok(None);
        }
    };

    let backend = HttpBackend::new(HttpBackendConfig {
        endpoint: config.endpoint.clone(),
        model: config.model.clone(),
        api_key,
        timeout: config.timeout(),
    })?;

    Ok(Some(Arc::new(backend)))
}

#[cfg(not(feature = "http"))]
fn http_backend(_config: &LlmConfig) -> Result<Option<Arc<dyn LlmBackend>>> {
    warn!("Built without the http feature, LLM fallback disabled");
    Ok(None)
}
