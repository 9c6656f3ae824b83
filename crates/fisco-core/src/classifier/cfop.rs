//! Operation type from CFOP ranges.

use crate::models::classification::OperationType;
use crate::models::invoice::Invoice;
use crate::validation::rules::patterns::CFOP;

/// Map a CFOP to its operation type.
///
/// Transfers and returns are recognized by the last three digits; anything
/// else falls back to the direction given by the first digit.
pub fn operation_type(cfop: &str) -> OperationType {
    let cfop = cfop.trim();
    if !CFOP.is_match(cfop) {
        return OperationType::Unknown;
    }

    let suffix: u16 = cfop[1..].parse().unwrap_or(0);
    match suffix {
        150..=159 | 408 | 409 | 552 | 557 => return OperationType::Transfer,
        200..=209 | 410 | 411 | 503 | 553 | 660..=662 => return OperationType::Return,
        _ => {}
    }

    match cfop.as_bytes()[0] {
        b'1'..=b'3' => OperationType::Purchase,
        b'5'..=b'7' => OperationType::Sale,
        _ => OperationType::Unknown,
    }
}

/// Operation type of the invoice's first item.
pub fn invoice_operation_type(invoice: &Invoice) -> OperationType {
    invoice
        .primary_cfop()
        .map(operation_type)
        .unwrap_or(OperationType::Unknown)
}
