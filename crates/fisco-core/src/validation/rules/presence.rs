//! Presence rules for items and item codes.

use super::item_field;
use super::patterns::NCM;
use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;
use crate::validation::RuleContext;

pub fn has_items(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    if !invoice.document_type.carries_items() || !invoice.items.is_empty() {
        return None;
    }

    Some(ValidationIssue::error(
        "NO_ITEMS",
        "items",
        format!("{} {} has no items", invoice.document_type, invoice.document_key),
    ))
}

/// NCM drives tax rates and the cost-center mapping, so a gap is a warning.
pub fn ncm_present(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    invoice
        .items
        .iter()
        .enumerate()
        .find_map(|(idx, item)| match item.ncm.as_deref() {
            None => Some(
                ValidationIssue::warning(
                    "MISSING_NCM",
                    item_field(idx, "ncm"),
                    format!("item {} has no NCM", item.number),
                )
                .with_suggestion("fill in the 8-digit NCM of the product"),
            ),
            Some(ncm) if !NCM.is_match(ncm) => Some(ValidationIssue::warning(
                "NCM_FORMAT",
                item_field(idx, "ncm"),
                format!("item {} has malformed NCM {:?}", item.number, ncm),
            )),
            Some(_) => None,
        })
}

pub fn cst_present(invoice: &Invoice, _ctx: &RuleContext) -> Option<ValidationIssue> {
    let (idx, item) = invoice
        .items
        .iter()
        .enumerate()
        .find(|(_, item)| item.cst.is_none())?;

    Some(ValidationIssue::info(
        "MISSING_CST",
        item_field(idx, "cst"),
        format!("item {} has no ICMS CST or CSOSN", item.number),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::DocumentType;
    use crate::models::issue::Severity;
    use crate::testing::sample_invoice;

    fn ctx() -> RuleContext {
        RuleContext::now(rust_decimal::Decimal::new(2, 2))
    }

    #[test]
    fn test_no_items() {
        let mut invoice = sample_invoice();
        invoice.items.clear();
        let issue = has_items(&invoice, &ctx()).unwrap();
        assert_eq!(issue.code, "NO_ITEMS");
        assert_eq!(issue.severity, Severity::Error);

        invoice.document_type = DocumentType::MDFe;
        assert!(has_items(&invoice, &ctx()).is_none());
    }

    #[test]
    fn test_ncm() {
        let mut invoice = sample_invoice();
        assert!(ncm_present(&invoice, &ctx()).is_none());

        invoice.items[0].ncm = Some("8471".to_string());
        assert_eq!(ncm_present(&invoice, &ctx()).unwrap().code, "NCM_FORMAT");

        invoice.items[0].ncm = None;
        let issue = ncm_present(&invoice, &ctx()).unwrap();
        assert_eq!(issue.code, "MISSING_NCM");
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.field, "items[0].ncm");
    }

    #[test]
    fn test_cst() {
        let mut invoice = sample_invoice();
        assert!(cst_present(&invoice, &ctx()).is_none());

        invoice.items[0].cst = None;
        let issue = cst_present(&invoice, &ctx()).unwrap();
        assert_eq!(issue.severity, Severity::Info);
    }
}
