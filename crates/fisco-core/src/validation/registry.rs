//! Ordered, name-keyed collection of validation rules.

use tracing::debug;

use super::rules;
use super::{FnRule, Rule, RuleContext};
use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;

/// Rules in registration order, unique by name.
///
/// Mutation takes `&mut self`; once the registry is shared for a batch it is
/// read-only.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function as a rule. A rule with the same name is replaced
    /// in place.
    pub fn add_rule<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&Invoice, &RuleContext) -> Option<ValidationIssue> + Send + Sync + 'static,
    {
        self.register(FnRule::new(name, check));
    }

    /// Register a rule object. A rule with the same name is replaced in place.
    pub fn register(&mut self, rule: impl Rule + 'static) {
        let rule: Box<dyn Rule> = Box::new(rule);
        match self.rules.iter().position(|r| r.name() == rule.name()) {
            Some(idx) => {
                debug!("Replacing rule {}", rule.name());
                self.rules[idx] = rule;
            }
            None => self.rules.push(rule),
        }
    }

    /// Remove a rule by name. Returns false if no such rule was registered.
    pub fn remove_rule(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.name() != name);
        before != self.rules.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.name() == name)
    }

    /// Rule names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }
}

/// Registry holding every built-in rule.
pub fn default_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    registry.add_rule("document_key_format", rules::document_key::document_key_format);
    registry.add_rule("document_key_check_digit", rules::document_key::document_key_check_digit);
    registry.add_rule("issuer_cnpj_format", rules::tax_id::issuer_cnpj_format);
    registry.add_rule("issuer_cnpj_check_digits", rules::tax_id::issuer_cnpj_check_digits);
    registry.add_rule("recipient_id_format", rules::tax_id::recipient_id_format);
    registry.add_rule("cfop_format", rules::cfop::cfop_format);
    registry.add_rule("item_totals", rules::amounts::item_totals);
    registry.add_rule("products_total", rules::amounts::products_total);
    registry.add_rule("invoice_total", rules::amounts::invoice_total);
    registry.add_rule("has_items", rules::presence::has_items);
    registry.add_rule("ncm_present", rules::presence::ncm_present);
    registry.add_rule("cst_present", rules::presence::cst_present);
    registry.add_rule("issue_date", rules::dates::issue_date);

    registry
}
