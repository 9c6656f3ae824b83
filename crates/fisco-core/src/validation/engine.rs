//! Validation engine.

use std::panic::{self, AssertUnwindSafe};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::registry::{RuleRegistry, default_registry};
use super::{Rule, RuleContext};
use crate::models::config::ValidationConfig;
use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;

/// Runs every registered rule against an invoice.
pub struct ValidationEngine {
    registry: RuleRegistry,
    tolerance: Decimal,
}

impl ValidationEngine {
    /// Create an engine over the given registry.
    pub fn new(registry: RuleRegistry, tolerance: Decimal) -> Self {
        Self {
            registry,
            tolerance,
        }
    }

    /// Built-in rules minus those disabled in the configuration.
    pub fn from_config(config: &ValidationConfig) -> Self {
        let mut registry = default_registry();
        for name in &config.disabled_rules {
            if !registry.remove_rule(name) {
                warn!("Disabled rule {} is not registered", name);
            }
        }
        Self::new(registry, config.tolerance)
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    /// Register a custom rule, replacing any rule of the same name.
    pub fn add_rule<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&Invoice, &RuleContext) -> Option<ValidationIssue> + Send + Sync + 'static,
    {
        self.registry.add_rule(name, check);
    }

    /// Remove a rule by name.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        self.registry.remove_rule(name)
    }

    /// Validate against today's date.
    pub fn validate(&self, invoice: &Invoice) -> Vec<ValidationIssue> {
        self.validate_with(invoice, &RuleContext::now(self.tolerance))
    }

    /// Validate with an explicit context. Never panics; a rule that panics is
    /// reported as a `RULE_FAILURE` error.
    pub fn validate_with(&self, invoice: &Invoice, ctx: &RuleContext) -> Vec<ValidationIssue> {
        let issues: Vec<ValidationIssue> = self
            .registry
            .iter()
            .filter_map(|rule| run_rule(rule, invoice, ctx))
            .collect();

        debug!(
            document_key = %invoice.document_key,
            "Ran {} rules, {} issues",
            self.registry.len(),
            issues.len()
        );

        issues
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

fn run_rule(rule: &dyn Rule, invoice: &Invoice, ctx: &RuleContext) -> Option<ValidationIssue> {
    match panic::catch_unwind(AssertUnwindSafe(|| rule.check(invoice, ctx))) {
        Ok(issue) => issue,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            warn!("Rule {} failed: {}", rule.name(), reason);

            Some(ValidationIssue::error(
                "RULE_FAILURE",
                rule.name(),
                format!("rule {} failed: {}", rule.name(), reason),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::Severity;
    use crate::testing::{dec, sample_invoice};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn ctx() -> RuleContext {
        RuleContext::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), dec("0.02"))
    }

    fn sorted(mut issues: Vec<ValidationIssue>) -> Vec<ValidationIssue> {
        issues.sort_by(|a, b| (&a.code, &a.field).cmp(&(&b.code, &b.field)));
        issues
    }

    fn broken_invoice() -> Invoice {
        let mut invoice = sample_invoice();
        invoice.issuer_id = "1122233300".to_string();
        invoice.items[0].total_price = dec("1000.03");
        invoice.items[0].ncm = None;
        invoice.header.issue_date = NaiveDate::from_ymd_opt(2030, 1, 1);
        invoice
    }

    #[test]
    fn test_valid_invoice_has_no_issues() {
        let engine = ValidationEngine::default();
        assert_eq!(engine.validate_with(&sample_invoice(), &ctx()), vec![]);
        assert_eq!(engine.validate(&sample_invoice()), vec![]);
    }

    #[test]
    fn test_ten_digit_cnpj() {
        let mut invoice = sample_invoice();
        invoice.issuer_id = "1122233300".to_string();

        let issues = ValidationEngine::default().validate_with(&invoice, &ctx());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "CNPJ_FORMAT");
        assert_eq!(issues[0].field, "issuer_id");
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_tolerance_boundary() {
        let engine = ValidationEngine::default();
        let mut invoice = sample_invoice();

        invoice.items[0].total_price = dec("1000.02");
        let issues = engine.validate_with(&invoice, &ctx());
        assert!(issues.iter().all(|i| i.code != "ITEM_TOTAL_MISMATCH"));

        invoice.items[0].total_price = dec("1000.03");
        let issues = engine.validate_with(&invoice, &ctx());
        assert!(issues.iter().any(|i| i.code == "ITEM_TOTAL_MISMATCH"));
    }

    #[test]
    fn test_idempotent() {
        let engine = ValidationEngine::default();
        let invoice = broken_invoice();
        let first = engine.validate_with(&invoice, &ctx());
        let second = engine.validate_with(&invoice, &ctx());
        assert_eq!(sorted(first), sorted(second));
    }

    #[test]
    fn test_order_independent() {
        let forward = ValidationEngine::new(default_registry(), dec("0.02"));

        let mut reversed_registry = RuleRegistry::new();
        let names: Vec<String> = default_registry().names().iter().map(|s| s.to_string()).collect();
        for name in names.iter().rev() {
            let source = default_registry();
            let rule_name = name.clone();
            reversed_registry.add_rule(name.clone(), move |invoice: &Invoice, ctx: &RuleContext| {
                source
                    .iter()
                    .find(|r| r.name() == rule_name)
                    .and_then(|r| r.check(invoice, ctx))
            });
        }
        let reversed = ValidationEngine::new(reversed_registry, dec("0.02"));

        let invoice = broken_invoice();
        let a = sorted(forward.validate_with(&invoice, &ctx()));
        let b = sorted(reversed.validate_with(&invoice, &ctx()));
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_panicking_rule_becomes_issue() {
        let mut engine = ValidationEngine::default();
        engine.add_rule("explodes", |_: &Invoice, _: &RuleContext| -> Option<ValidationIssue> {
            panic!("boom")
        });

        let issues = engine.validate_with(&sample_invoice(), &ctx());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "RULE_FAILURE");
        assert_eq!(issues[0].field, "explodes");
        assert!(issues[0].message.contains("boom"));
    }

    #[test]
    fn test_custom_rule_and_removal() {
        let mut engine = ValidationEngine::default();
        engine.add_rule("min_value", |invoice: &Invoice, _: &RuleContext| {
            (invoice.totals.total_invoice < dec("5000"))
                .then(|| ValidationIssue::info("LOW_VALUE", "totals.total_invoice", "below 5000"))
        });
        assert_eq!(engine.validate_with(&sample_invoice(), &ctx()).len(), 1);

        assert!(engine.remove_rule("min_value"));
        assert!(engine.validate_with(&sample_invoice(), &ctx()).is_empty());
    }

    #[test]
    fn test_disabled_rules_from_config() {
        let config = ValidationConfig {
            disabled_rules: vec!["issuer_cnpj_format".to_string(), "missing".to_string()],
            ..Default::default()
        };
        let engine = ValidationEngine::from_config(&config);
        assert!(!engine.registry().contains("issuer_cnpj_format"));

        let mut invoice = sample_invoice();
        invoice.issuer_id = "1122233300".to_string();
        assert!(engine.validate_with(&invoice, &ctx()).is_empty());
    }

    #[test]
    fn test_zero_items_never_panics() {
        let mut invoice = sample_invoice();
        invoice.items.clear();
        invoice.issuer_id.clear();
        let issues = ValidationEngine::default().validate_with(&invoice, &ctx());
        let codes: Vec<&str> = issues.iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&"NO_ITEMS"));
        assert!(codes.contains(&"CNPJ_FORMAT"));
        assert!(!codes.contains(&"RULE_FAILURE"));
    }
}
