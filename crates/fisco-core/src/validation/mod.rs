//! Rule registry and validation engine.
//!
//! A rule is a named, pure check over an [`Invoice`] that yields at most one
//! [`ValidationIssue`]. The engine runs every registered rule and collects the
//! findings; a rule that panics is reported as a `RULE_FAILURE` issue.

pub mod engine;
pub mod registry;
pub mod rules;

pub use engine::ValidationEngine;
pub use registry::{RuleRegistry, default_registry};

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;

use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;

/// Evaluation-time inputs shared by all rules of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleContext {
    /// Date used by temporal rules.
    pub today: NaiveDate,
    /// Absolute tolerance for monetary comparisons.
    pub tolerance: Decimal,
}

impl RuleContext {
    pub fn new(today: NaiveDate, tolerance: Decimal) -> Self {
        Self { today, tolerance }
    }

    /// Context dated with the local calendar date.
    pub fn now(tolerance: Decimal) -> Self {
        Self::new(Local::now().date_naive(), tolerance)
    }

    /// Whether two amounts differ by no more than the tolerance.
    pub fn within_tolerance(&self, a: Decimal, b: Decimal) -> bool {
        (a - b).abs() <= self.tolerance
    }
}

/// A named validation rule.
pub trait Rule: Send + Sync {
    /// Unique name in the registry.
    fn name(&self) -> &str;

    /// Check the invoice. Must not depend on other rules or mutate anything.
    fn check(&self, invoice: &Invoice, ctx: &RuleContext) -> Option<ValidationIssue>;
}

/// Rule backed by a function or closure.
pub struct FnRule<F> {
    name: String,
    check: F,
}

impl<F> FnRule<F>
where
    F: Fn(&Invoice, &RuleContext) -> Option<ValidationIssue> + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&Invoice, &RuleContext) -> Option<ValidationIssue> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, invoice: &Invoice, ctx: &RuleContext) -> Option<ValidationIssue> {
        (self.check)(invoice, ctx)
    }
}
