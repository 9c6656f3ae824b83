//! Access key (chave de acesso) format and check digit.

use super::patterns::DOCUMENT_KEY;
use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;
use crate::validation::RuleContext;

const FIELD: &str = "document_key";

/// Validate the mod-11 check digit of a 44-digit access key.
///
/// Weights 2 to 9 are applied cyclically from the rightmost of the first 43
/// digits. A result of 10 or 11 maps to 0.
pub fn validate_document_key(key: &str) -> bool {
    if !DOCUMENT_KEY.is_match(key) {
        return false;
    }

    let digits: Vec<u32> = key.chars().filter_map(|c| c.to_digit(10)).collect();
    let sum: u32 = digits[..43]
        .iter()
        .rev()
        .zip((2..=9).cycle())
        .map(|(d, w)| d * w)
        .sum();

    let dv = 11 - sum % 11;
    let dv = if dv >= 10 { 0 } else { dv };

    dv == digits[43]
}

pub fn document_key_format(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    if DOCUMENT_KEY.is_match(&invoice.document_key) {
        return None;
    }

    Some(
        ValidationIssue::error(
            "DOCUMENT_KEY_FORMAT",
            FIELD,
            format!(
                "access key must have 44 digits, got {:?} ({} characters)",
                invoice.document_key,
                invoice.document_key.chars().count()
            ),
        )
        .with_suggestion("copy the key from the Id attribute of infNFe or from the protocol"),
    )
}

/// Only checked when the key is well formed.
pub fn document_key_check_digit(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    if !DOCUMENT_KEY.is_match(&invoice.document_key) || validate_document_key(&invoice.document_key) {
        return None;
    }

    Some(ValidationIssue::error(
        "DOCUMENT_KEY_CHECK_DIGIT",
        FIELD,
        format!("access key {} has an invalid check digit", invoice.document_key),
    ))
}
