//! LLM fallback tier: prompt contract, call gate and reply grammar.

use std::sync::Arc;
use std::time::Duration;

use fisco_llm::{CompletionRequest, LlmBackend};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::ClassificationFailure;
use crate::models::config::LlmConfig;
use crate::models::invoice::Invoice;

const SYSTEM_PROMPT: &str = "Você classifica documentos fiscais brasileiros em centros de custo. \
Responda somente com um dos rótulos permitidos, exatamente como escrito, sem explicações.";

const MAX_PROMPT_ITEMS: usize = 5;

const LABEL_PREFIXES: [&str; 2] = ["centro de custo:", "cost center:"];

/// Bounded, cancellable access to an LLM backend.
///
/// At most `max_concurrent` calls run at once and each one is cut off after
/// `timeout`. Cancelling closes the gate: calls already running finish, new
/// ones fail with [`ClassificationFailure::Cancelled`].
pub struct LlmGate {
    backend: Arc<dyn LlmBackend>,
    permits: Semaphore,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl LlmGate {
    pub fn new(backend: Arc<dyn LlmBackend>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            backend,
            permits: Semaphore::new(max_concurrent.max(1)),
            timeout,
            temperature: 0.0,
            max_tokens: 32,
        }
    }

    /// Gate configured from the `llm` section.
    pub fn from_config(backend: Arc<dyn LlmBackend>, config: &LlmConfig) -> Self {
        Self::new(backend, config.max_concurrent, config.timeout())
            .with_sampling(config.temperature, config.max_tokens)
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Stop issuing new calls.
    pub fn cancel(&self) {
        self.permits.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.permits.is_closed()
    }

    /// Ask for one label out of `labels`.
    pub async fn classify(&self, invoice: &Invoice, labels: &[String]) -> Result<String, ClassificationFailure> {
        let request = build_request(invoice, labels)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let reply = self.complete(&request).await?;
        parse_label(&reply, labels)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ClassificationFailure> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ClassificationFailure::Cancelled)?;

        debug!("Calling LLM backend {}", self.backend.name());

        match tokio::time::timeout(self.timeout, self.backend.complete(request)).await {
            Ok(reply) => Ok(reply?),
            Err(_) => Err(ClassificationFailure::Timeout(self.timeout)),
        }
    }
}

/// Build the classification prompt.
///
/// The user message always carries the issuer name, the NCM codes and the
/// CFOP, followed by the allowed labels.
pub fn build_request(invoice: &Invoice, labels: &[String]) -> CompletionRequest {
    let ncm_codes = invoice.ncm_codes();
    let ncm = if ncm_codes.is_empty() {
        "nenhum".to_string()
    } else {
        ncm_codes.join(", ")
    };

    let mut prompt = String::new();
    prompt.push_str(&format!("Emitente: {} (CNPJ/CPF {})\n", invoice.issuer.name, invoice.issuer_id));
    prompt.push_str(&format!("NCM: {}\n", ncm));
    prompt.push_str(&format!("CFOP: {}\n", invoice.primary_cfop().unwrap_or("ausente")));
    if let Some(nature) = &invoice.header.nature_of_operation {
        prompt.push_str(&format!("Natureza da operação: {}\n", nature));
    }

    let descriptions: Vec<&str> = invoice
        .items
        .iter()
        .map(|i| i.description.as_str())
        .filter(|d| !d.is_empty())
        .take(MAX_PROMPT_ITEMS)
        .collect();
    if !descriptions.is_empty() {
        prompt.push_str(&format!("Itens: {}\n", descriptions.join("; ")));
    }

    prompt.push_str("\nRótulos permitidos:\n");
    for label in labels {
        prompt.push_str(&format!("- {}\n", label));
    }
    prompt.push_str("\nResponda com exatamente um rótulo.");

    CompletionRequest::new(SYSTEM_PROMPT, prompt)
}

/// Strict reply grammar.
///
/// Surrounding whitespace, quotes or backticks, one trailing period and an
/// optional `centro de custo:` / `cost center:` prefix are tolerated. What
/// remains must equal a known label, ignoring case. The canonical label is
/// returned.
pub fn parse_label(reply: &str, labels: &[String]) -> Result<String, ClassificationFailure> {
    let unparseable = || ClassificationFailure::Unparseable(reply.chars().take(200).collect());

    let mut text = strip_wrapping(reply);
    for prefix in LABEL_PREFIXES {
        let has_prefix = text
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if has_prefix {
            text = strip_wrapping(&text[prefix.len()..]);
            break;
        }
    }

    if text.is_empty() || text.contains('\n') {
        return Err(unparseable());
    }

    let wanted = text.to_lowercase();
    labels
        .iter()
        .find(|label| label.to_lowercase() == wanted)
        .cloned()
        .ok_or_else(unparseable)
}

fn strip_wrapping(text: &str) -> &str {
    let is_quote = |c: char| matches!(c, '"' | '\'' | '`');
    let text = text.trim().trim_matches(is_quote);
    let text = text.strip_suffix('.').unwrap_or(text);
    text.trim().trim_matches(is_quote).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_invoice;
    use fisco_llm::{LlmError, ScriptedBackend};
    use pretty_assertions::assert_eq;

    fn labels() -> Vec<String> {
        vec![
            "TI - Equipamentos".to_string(),
            "Serviços - Consultoria".to_string(),
        ]
    }

    #[test]
    fn test_prompt_contains_context() {
        let request = build_request(&sample_invoice(), &labels());
        let prompt = request.user_prompt().unwrap();

        assert!(prompt.contains("ACME INDUSTRIA E COMERCIO LTDA"));
        assert!(prompt.contains("NCM: 84713012"));
        assert!(prompt.contains("CFOP: 5102"));
        assert!(prompt.contains("- Serviços - Consultoria"));
    }

    #[test]
    fn test_prompt_without_items() {
        let mut invoice = sample_invoice();
        invoice.items.clear();
        let request = build_request(&invoice, &labels());
        let prompt = request.user_prompt().unwrap();
        assert!(prompt.contains("NCM: nenhum"));
        assert!(prompt.contains("CFOP: ausente"));
    }

    #[test]
    fn test_parse_label_accepts_wrapped_answers() {
        let labels = labels();
        for reply in [
            "TI - Equipamentos",
            "  ti - equipamentos\n",
            "\"TI - Equipamentos\".",
            "`TI - Equipamentos.`",
            "Centro de custo: TI - Equipamentos",
            "cost center: \"TI - Equipamentos\"",
        ] {
            assert_eq!(parse_label(reply, &labels).unwrap(), "TI - Equipamentos", "{reply:?}");
        }
        assert_eq!(
            parse_label("serviços - consultoria", &labels).unwrap(),
            "Serviços - Consultoria"
        );
    }

    #[test]
    fn test_parse_label_rejects_free_text() {
        let labels = labels();
        for reply in [
            "",
            "Acho que é TI - Equipamentos",
            "TI - Equipamentos\nporque é um notebook",
            "TI",
            "Não Classificado",
            "TI - Equipamentos..",
        ] {
            assert!(
                matches!(parse_label(reply, &labels), Err(ClassificationFailure::Unparseable(_))),
                "{reply:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_gate_returns_label() {
        let backend = Arc::new(ScriptedBackend::replying("TI - Equipamentos"));
        let gate = LlmGate::new(backend.clone(), 2, Duration::from_secs(1));

        let label = gate.classify(&sample_invoice(), &labels()).await.unwrap();
        assert_eq!(label, "TI - Equipamentos");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_gate_timeout() {
        let backend = Arc::new(ScriptedBackend::replying("TI - Equipamentos").with_delay(Duration::from_millis(500)));
        let gate = LlmGate::new(backend, 1, Duration::from_millis(20));

        let err = gate.classify(&sample_invoice(), &labels()).await.unwrap_err();
        assert!(matches!(err, ClassificationFailure::Timeout(_)));
    }

    #[tokio::test]
    async fn test_gate_backend_failure() {
        let gate = LlmGate::new(Arc::new(ScriptedBackend::failing("503")), 1, Duration::from_secs(1));
        let err = gate.classify(&sample_invoice(), &labels()).await.unwrap_err();
        assert!(matches!(err, ClassificationFailure::Backend(LlmError::Request(_))));
    }

    #[tokio::test]
    async fn test_cancelled_gate_makes_no_calls() {
        let backend = Arc::new(ScriptedBackend::replying("TI - Equipamentos"));
        let gate = LlmGate::new(backend.clone(), 1, Duration::from_secs(1));
        gate.cancel();

        assert!(gate.is_cancelled());
        let err = gate.classify(&sample_invoice(), &labels()).await.unwrap_err();
        assert!(matches!(err, ClassificationFailure::Cancelled));
        assert_eq!(backend.calls(), 0);
    }
}
