//! Arithmetic rules over item and document totals.
//!
//! All comparisons use exact decimals and the absolute tolerance from the
//! rule context. Rules that compare against ICMS totals only apply to models
//! that carry items.

use super::item_field;
use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;
use crate::validation::RuleContext;

/// Each item's declared total must equal quantity times unit price.
pub fn item_totals(invoice: &Invoice, ctx: &RuleContext) -> Option<ValidationIssue> {
    invoice.items.iter().enumerate().find_map(|(idx, item)| {
        let field = item_field(idx, "total_price");
        match item.expected_total() {
            Some(expected) if ctx.within_tolerance(expected, item.total_price) => None,
            Some(expected) => Some(
                ValidationIssue::error(
                    "ITEM_TOTAL_MISMATCH",
                    field,
                    format!(
                        "item {}: {} x {} = {}, declared {}",
                        item.number,
                        item.quantity,
                        item.unit_price,
                        expected,
                        item.total_price
                    ),
                )
                .with_suggestion(format!("difference exceeds tolerance of {}", ctx.tolerance)),
            ),
            None => Some(ValidationIssue::error(
                "ITEM_TOTAL_MISMATCH",
                field,
                format!("item {}: quantity times unit price overflows", item.number),
            )),
        }
    })
}

/// Sum of item totals must match the declared products total.
pub fn products_total(invoice: &Invoice, ctx: &RuleContext) -> Option<ValidationIssue> {
    if !invoice.document_type.carries_items() || invoice.items.is_empty() {
        return None;
    }

    let declared = invoice.totals.total_products;
    match invoice.items_total() {
        Some(sum) if ctx.within_tolerance(sum, declared) => None,
        Some(sum) => Some(ValidationIssue::error(
            "PRODUCTS_TOTAL_MISMATCH",
            "totals.total_products",
            format!("items sum to {}, declared products total is {}", sum, declared),
        )),
        None => Some(ValidationIssue::error(
            "PRODUCTS_TOTAL_MISMATCH",
            "totals.total_products",
            "sum of item totals overflows",
        )),
    }
}

/// Declared document total must match products minus discount plus ST,
/// freight, insurance, other charges and IPI.
pub fn invoice_total(invoice: &Invoice, ctx: &RuleContext) -> Option<ValidationIssue> {
    if !invoice.document_type.carries_items() {
        return None;
    }

    let t = &invoice.totals;
    match t.computed_invoice_total() {
        Some(computed) if ctx.within_tolerance(computed, t.total_invoice) => None,
        Some(computed) => Some(
            ValidationIssue::error(
                "INVOICE_TOTAL_MISMATCH",
                "totals.total_invoice",
                format!(
                    "computed document total is {}, declared {}",
                    computed, t.total_invoice
                ),
            )
            .with_suggestion("vNF = vProd - vDesc + vST + vFrete + vSeg + vOutro + vIPI"),
        ),
        None => Some(ValidationIssue::error(
            "INVOICE_TOTAL_MISMATCH",
            "totals.total_invoice",
            "document total overflows",
        )),
    }
}
