//! Rendering processed documents as JSON, CSV or text.

use fisco_core::models::issue::severity_counts;
use fisco_core::ProcessedDocument;

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub const CSV_HEADER: [&str; 13] = [
    "document_key",
    "document_type",
    "number",
    "issue_date",
    "issuer_id",
    "issuer_name",
    "total_invoice",
    "operation_type",
    "cost_center",
    "confidence",
    "errors",
    "warnings",
    "infos",
];

pub fn format_document(doc: &ProcessedDocument, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(doc)?),
        OutputFormat::Csv => format_csv(doc),
        OutputFormat::Text => Ok(format_text(doc)),
    }
}

/// One CSV row, in [`CSV_HEADER`] order.
pub fn csv_record(doc: &ProcessedDocument) -> Vec<String> {
    let invoice = &doc.invoice;
    let (errors, warnings, infos) = severity_counts(&doc.issues);

    vec![
        invoice.document_key.clone(),
        invoice.document_type.to_string(),
        invoice.header.number.clone().unwrap_or_default(),
        invoice.header.issue_date.map(|d| d.to_string()).unwrap_or_default(),
        invoice.issuer_id.clone(),
        invoice.issuer.name.clone(),
        invoice.totals.total_invoice.to_string(),
        doc.classification.operation_type.to_string(),
        doc.classification.cost_center.clone(),
        format!("{:.2}", doc.classification.confidence),
        errors.to_string(),
        warnings.to_string(),
        infos.to_string(),
    ]
}

fn format_csv(doc: &ProcessedDocument) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;
    wtr.write_record(csv_record(doc))?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(doc: &ProcessedDocument) -> String {
    let invoice = &doc.invoice;
    let mut output = String::new();

    output.push_str(&format!("{}: {}\n", invoice.document_type, invoice.document_key));
    if let Some(number) = &invoice.header.number {
        let series = invoice.header.series.as_deref().unwrap_or("-");
        output.push_str(&format!("Number: {} (series {})\n", number, series));
    }
    if let Some(date) = invoice.header.issue_date {
        output.push_str(&format!("Date: {}\n", date));
    }
    output.push('\n');

    output.push_str("Issuer:\n");
    output.push_str(&format!("  {}\n", invoice.issuer.name));
    output.push_str(&format!("  CNPJ/CPF: {}\n", invoice.issuer_id));
    output.push('\n');

    if let Some(recipient_id) = &invoice.recipient_id {
        output.push_str("Recipient:\n");
        output.push_str(&format!("  {}\n", invoice.recipient.name));
        output.push_str(&format!("  CNPJ/CPF: {}\n", recipient_id));
        output.push('\n');
    }

    output.push_str(&format!("Items: {}\n", invoice.items.len()));
    output.push_str(&format!("Products: {}\n", invoice.totals.total_products));
    output.push_str(&format!("Total:    {}\n", invoice.totals.total_invoice));
    output.push('\n');

    let c = &doc.classification;
    output.push_str("Classification:\n");
    output.push_str(&format!("  Operation:   {}\n", c.operation_type));
    output.push_str(&format!("  Cost center: {}\n", c.cost_center));
    output.push_str(&format!("  Confidence:  {:.2}\n", c.confidence));
    output.push_str(&format!("  Reasoning:   {}\n", c.reasoning));

    if doc.issues.is_empty() {
        output.push_str("\nNo validation issues.\n");
    } else {
        output.push_str("\nValidation issues:\n");
        for issue in &doc.issues {
            output.push_str(&format!("  - {}\n", issue));
        }
    }

    output
}
