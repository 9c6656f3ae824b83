//! Validation issue model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// A finding produced by a validation rule.
///
/// Carries no reference to the invoice it came from, so lists of issues can
/// be stored and serialized on their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable machine-readable code, e.g. `CNPJ_FORMAT`.
    pub code: String,

    /// Severity level.
    pub severity: Severity,

    /// Human-readable description.
    pub message: String,

    /// Path of the offending field, e.g. `issuer_id` or `items[2].cfop`.
    pub field: String,

    /// Optional hint on how to fix it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create an issue without a suggestion.
    pub fn new(
        code: impl Into<String>,
        severity: Severity,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            field: field.into(),
            suggestion: None,
        }
    }

    /// Shorthand for an error-severity issue.
    pub fn error(code: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, field, message)
    }

    /// Shorthand for a warning-severity issue.
    pub fn warning(code: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, field, message)
    }

    /// Shorthand for an info-severity issue.
    pub fn info(code: impl Into<String>, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, field, message)
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Whether this issue is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}): {}", self.severity, self.code, self.field, self.message)
    }
}

/// Count issues per severity: (errors, warnings, infos).
pub fn severity_counts(issues: &[ValidationIssue]) -> (usize, usize, usize) {
    issues.iter().fold((0, 0, 0), |(e, w, i), issue| match issue.severity {
        Severity::Error => (e + 1, w, i),
        Severity::Warning => (e, w + 1, i),
        Severity::Info => (e, w, i + 1),
    })
}
