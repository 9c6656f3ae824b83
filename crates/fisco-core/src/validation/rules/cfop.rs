//! CFOP format rule.

use super::item_field;
use super::patterns::CFOP;
use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;
use crate::validation::RuleContext;

/// Reports the first item whose CFOP is absent or not a 4-digit code
/// starting with 1-3 or 5-7.
pub fn cfop_format(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    invoice.items.iter().enumerate().find_map(|(idx, item)| {
        let message = match item.cfop.as_deref() {
            None => format!("item {} has no CFOP", item.number),
            Some(cfop) if !CFOP.is_match(cfop) => {
                format!("item {} has malformed CFOP {:?}", item.number, cfop)
            }
            Some(_) => return None,
        };

        Some(
            ValidationIssue::error("CFOP_FORMAT", item_field(idx, "cfop"), message)
                .with_suggestion("CFOP is 4 digits; the first one is 1-3 for inbound or 5-7 for outbound"),
        )
    })
}
