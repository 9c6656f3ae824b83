//! CNPJ and CPF format and check digit validation.

use super::patterns::{CNPJ, CPF, DIGITS_ONLY};
use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;
use crate::validation::RuleContext;

const CNPJ_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

fn digits(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

/// Validate a CNPJ using its two mod-11 check digits.
///
/// Weights: 5,4,3,2,9,8,7,6,5,4,3,2 for the first digit and
/// 6,5,4,3,2,9,8,7,6,5,4,3,2 for the second. Repeated-digit numbers are
/// rejected.
pub fn validate_cnpj(cnpj: &str) -> bool {
    if !CNPJ.is_match(cnpj) {
        return false;
    }

    let digits = digits(cnpj);
    if all_same(&digits) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let weights = &CNPJ_WEIGHTS[CNPJ_WEIGHTS.len() - len..];
        let sum: u32 = digits[..len].iter().zip(weights).map(|(d, w)| d * w).sum();
        let rem = sum % 11;
        if rem < 2 { 0 } else { 11 - rem }
    };

    check(12) == digits[12] && check(13) == digits[13]
}

/// Validate a CPF using its two mod-11 check digits.
pub fn validate_cpf(cpf: &str) -> bool {
    if !CPF.is_match(cpf) {
        return false;
    }

    let digits = digits(cpf);
    if all_same(&digits) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .zip((2..=len as u32 + 1).rev())
            .map(|(d, w)| d * w)
            .sum();
        let dv = sum * 10 % 11;
        if dv == 10 { 0 } else { dv }
    };

    check(9) == digits[9] && check(10) == digits[10]
}

/// Format a CNPJ as XX.XXX.XXX/XXXX-XX, or a CPF as XXX.XXX.XXX-XX.
pub fn format_tax_id(id: &str) -> String {
    if CNPJ.is_match(id) {
        format!("{}.{}.{}/{}-{}", &id[0..2], &id[2..5], &id[5..8], &id[8..12], &id[12..14])
    } else if CPF.is_match(id) {
        format!("{}.{}.{}-{}", &id[0..3], &id[3..6], &id[6..9], &id[9..11])
    } else {
        id.to_string()
    }
}

pub fn issuer_cnpj_format(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    let id = &invoice.issuer_id;
    if CNPJ.is_match(id) || CPF.is_match(id) {
        return None;
    }

    Some(
        ValidationIssue::error(
            "CNPJ_FORMAT",
            "issuer_id",
            format!(
                "issuer id must be a 14-digit CNPJ or an 11-digit CPF, got {:?}",
                id
            ),
        )
        .with_suggestion("use digits only, without dots, slash or dash"),
    )
}

/// Only checked when the issuer id is well formed.
pub fn issuer_cnpj_check_digits(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    let id = &invoice.issuer_id;
    let valid = if CNPJ.is_match(id) {
        validate_cnpj(id)
    } else if CPF.is_match(id) {
        validate_cpf(id)
    } else {
        return None;
    };

    if valid {
        return None;
    }

    Some(ValidationIssue::error(
        "CNPJ_CHECK_DIGITS",
        "issuer_id",
        format!("issuer id {} has invalid check digits", format_tax_id(id)),
    ))
}

/// Recipient ids with non-digit characters are foreign (idEstrangeiro) and
/// are not checked.
pub fn recipient_id_format(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    let id = invoice.recipient_id.as_deref()?;
    if !DIGITS_ONLY.is_match(id) || validate_cnpj(id) || validate_cpf(id) {
        return None;
    }

    Some(ValidationIssue::warning(
        "RECIPIENT_ID_FORMAT",
        "recipient_id",
        format!("recipient id {:?} is not a valid CNPJ or CPF", id),
    ))
}
