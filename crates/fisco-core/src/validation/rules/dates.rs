//! Issue date rule.

use crate::models::invoice::Invoice;
use crate::models::issue::ValidationIssue;
use crate::validation::RuleContext;

const FIELD: &str = "header.issue_date";

pub fn issue_date(invoice: &Invoice, ctx: &RuleContext) -> Option<ValidationIssue> {
    match invoice.header.issue_date {
        None => Some(ValidationIssue::warning(
            "MISSING_ISSUE_DATE",
            FIELD,
            "document has no issue date",
        )),
        Some(date) if date > ctx.today => Some(
            ValidationIssue::error(
                "FUTURE_ISSUE_DATE",
                FIELD,
                format!("issue date {} is after {}", date, ctx.today),
            )
            .with_suggestion("check dhEmi and the issuer clock"),
        ),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::issue::Severity;
    use crate::testing::sample_invoice;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn ctx(y: i32, m: u32, d: u32) -> RuleContext {
        RuleContext::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), Decimal::ZERO)
    }

    #[test]
    fn test_same_day_is_fine() {
        assert!(issue_date(&sample_invoice(), &ctx(2024, 1, 15)).is_none());
    }

    #[test]
    fn test_future_date() {
        let issue = issue_date(&sample_invoice(), &ctx(2024, 1, 14)).unwrap();
        assert_eq!(issue.code, "FUTURE_ISSUE_DATE");
        assert_eq!(issue.severity, Severity::Error);
    }

    #[test]
    fn test_missing_date() {
        let mut invoice = sample_invoice();
        invoice.header.issue_date = None;
        let issue = issue_date(&invoice, &ctx(2024, 1, 14)).unwrap();
        assert_eq!(issue.code, "MISSING_ISSUE_DATE");
        assert_eq!(issue.severity, Severity::Warning);
    }
}
