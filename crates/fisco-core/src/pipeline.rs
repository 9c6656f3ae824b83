//! Normalize, validate and classify documents, one at a time or in batches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::error::{DocumentError, ParseError, Result};
use crate::models::classification::{ClassificationResult, Tier};
use crate::models::config::FiscoConfig;
use crate::models::invoice::Invoice;
use crate::models::issue::{ValidationIssue, severity_counts};
use crate::normalizer::{DocumentNormalizer, NfeParser};
use crate::validation::ValidationEngine;

/// Everything produced for one document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub invoice: Invoice,
    pub issues: Vec<ValidationIssue>,
    pub classification: ClassificationResult,
}

impl ProcessedDocument {
    /// Whether validation found any error-severity issue.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(ValidationIssue::is_error)
    }
}

/// One input of a batch.
#[derive(Debug, Clone)]
pub struct BatchInput {
    /// Where the bytes came from, e.g. a file path.
    pub source: String,
    pub raw: Vec<u8>,
}

impl BatchInput {
    pub fn new(source: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            source: source.into(),
            raw: raw.into(),
        }
    }
}

/// Result for one input of a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub source: String,
    pub result: std::result::Result<ProcessedDocument, DocumentError>,
}

/// Aggregate counts over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub llm_classified: usize,
    pub unclassified: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[BatchOutcome]) -> Self {
        let fallback = Tier::Fallback.confidence().unwrap_or_default();
        let mut summary = Self {
            total: outcomes.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            match &outcome.result {
                Ok(doc) => {
                    summary.processed += 1;
                    let (e, w, i) = severity_counts(&doc.issues);
                    summary.errors += e;
                    summary.warnings += w;
                    summary.infos += i;
                    if doc.classification.used_llm_fallback {
                        summary.llm_classified += 1;
                    }
                    if doc.classification.confidence <= fallback {
                        summary.unclassified += 1;
                    }
                }
                Err(DocumentError::Cancelled) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
        }

        summary
    }
}

/// Stops a running batch.
///
/// Documents not yet started are skipped and the LLM gate is closed.
/// Documents already in progress run to completion.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    classifier: Arc<Classifier>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("Cancelling batch");
        }
        self.classifier.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Normalizer, validation engine and classifier wired together.
///
/// Cheap to clone; clones share the engine, the classifier and its cache.
#[derive(Clone)]
pub struct Pipeline {
    parser: NfeParser,
    engine: Arc<ValidationEngine>,
    classifier: Arc<Classifier>,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(engine: ValidationEngine, classifier: Classifier) -> Self {
        Self {
            parser: NfeParser::new(),
            engine: Arc::new(engine),
            classifier: Arc::new(classifier),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build every stage from configuration.
    pub fn from_config(config: &FiscoConfig) -> Result<Self> {
        config.check()?;
        let engine = ValidationEngine::from_config(&config.validation);
        let classifier = Classifier::from_config(config)?;
        Ok(Self::new(engine, classifier))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancelled.clone(),
            classifier: self.classifier.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Process one document. Only normalization can fail.
    pub async fn process(&self, raw: &[u8]) -> std::result::Result<ProcessedDocument, ParseError> {
        let invoice = self.parser.normalize(raw)?;
        let issues = self.engine.validate(&invoice);
        let classification = self.classifier.classify(&invoice).await;

        info!(
            document_key = %invoice.document_key,
            "{} issues, operation {}, cost center {:?} ({:.2})",
            issues.len(),
            classification.operation_type,
            classification.cost_center,
            classification.confidence
        );

        Ok(ProcessedDocument {
            invoice,
            issues,
            classification,
        })
    }

    /// Process documents concurrently, at most `jobs` at a time.
    ///
    /// Outcomes are returned in input order.
    pub async fn process_batch(&self, inputs: Vec<BatchInput>, jobs: usize) -> Vec<BatchOutcome> {
        let permits = Arc::new(Semaphore::new(jobs.max(1)));
        let mut tasks = JoinSet::new();
        let mut sources = Vec::with_capacity(inputs.len());

        for (index, input) in inputs.into_iter().enumerate() {
            sources.push(input.source.clone());
            let pipeline = self.clone();
            let permits = permits.clone();

            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) if !pipeline.is_cancelled() => pipeline
                        .process(&input.raw)
                        .await
                        .map_err(DocumentError::from),
                    _ => Err(DocumentError::Cancelled),
                };
                if let Err(e) = &result {
                    debug!("{}: {}", input.source, e);
                }
                (index, result)
            });
        }

        let mut results: Vec<Option<std::result::Result<ProcessedDocument, DocumentError>>> =
            sources.iter().map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!("Batch worker failed: {}", e),
            }
        }

        let outcomes: Vec<BatchOutcome> = sources
            .into_iter()
            .zip(results)
            .map(|(source, result)| BatchOutcome {
                source,
                result: result.unwrap_or_else(|| Err(DocumentError::Worker("task did not finish".to_string()))),
            })
            .collect();

        let summary = BatchSummary::from_outcomes(&outcomes);
        info!(
            "Batch done: {} processed, {} failed, {} skipped",
            summary.processed, summary.failed, summary.skipped
        );

        outcomes
    }
}
