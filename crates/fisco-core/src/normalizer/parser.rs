//! Streaming parser for NF-e, NFC-e, CT-e and MDF-e XML.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::ParseError;
use crate::models::invoice::*;

use super::{DocumentNormalizer, Result};

const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Pull parser over the raw document bytes.
///
/// DTDs are rejected outright and only the five predefined XML entities are
/// ever resolved, so external entities cannot be expanded.
#[derive(Debug, Clone)]
pub struct NfeParser {
    /// Upper bound on accepted document size.
    max_bytes: usize,
}

impl NfeParser {
    /// Create a parser with default settings.
    pub fn new() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Set the maximum accepted document size in bytes.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn parse(&self, raw: &[u8]) -> Result<Invoice> {
        if raw.len() > self.max_bytes {
            return Err(ParseError::Xml(format!(
                "document is {} bytes, limit is {}",
                raw.len(),
                self.max_bytes
            )));
        }

        let mut reader = Reader::from_reader(raw);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut draft = DocumentDraft::default();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::DocType(_)) => return Err(ParseError::DoctypeForbidden),
                Ok(Event::Start(e)) => {
                    let name = local_name(&e)?;
                    draft.on_start(&name, &e)?;
                    path.push(name);
                    text.clear();
                }
                Ok(Event::Empty(e)) => {
                    let name = local_name(&e)?;
                    draft.on_start(&name, &e)?;
                    path.push(name);
                    draft.on_end(&path, "")?;
                    path.pop();
                }
                Ok(Event::Text(t)) => {
                    let value = t.unescape().map_err(xml)?;
                    text.push_str(&value);
                }
                Ok(Event::CData(c)) => {
                    let value = std::str::from_utf8(&c).map_err(xml)?;
                    text.push_str(value);
                }
                Ok(Event::End(_)) => {
                    draft.on_end(&path, text.trim())?;
                    text.clear();
                    path.pop();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(xml(e)),
            }
            buf.clear();
        }

        if let Some(open) = path.last() {
            return Err(ParseError::Xml(format!(
                "unexpected end of document inside <{}>",
                open
            )));
        }
        if draft.root.is_none() {
            return Err(ParseError::Xml("document has no root element".to_string()));
        }

        draft.finish()
    }
}

impl Default for NfeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentNormalizer for NfeParser {
    fn normalize(&self, raw: &[u8]) -> Result<Invoice> {
        let invoice = self.parse(raw)?;

        info!(
            document_key = %invoice.document_key,
            "Normalized {} with {} items",
            invoice.document_type,
            invoice.items.len()
        );

        Ok(invoice)
    }
}

/// Line item being assembled while its `det` element is open.
struct ItemDraft {
    number: u32,
    product_code: Option<String>,
    description: String,
    ncm: Option<String>,
    cfop: Option<String>,
    cst: Option<String>,
    unit: Option<String>,
    quantity: Option<Decimal>,
    unit_price: Option<Decimal>,
    total_price: Option<Decimal>,
    taxes: ItemTaxes,
}

impl ItemDraft {
    fn new(number: u32) -> Self {
        Self {
            number,
            product_code: None,
            description: String::new(),
            ncm: None,
            cfop: None,
            cst: None,
            unit: None,
            quantity: None,
            unit_price: None,
            total_price: None,
            taxes: ItemTaxes::default(),
        }
    }

    fn field(&self, tag: &str) -> String {
        format!("det[{}]/{}", self.number, tag)
    }

    fn finish(self) -> Result<InvoiceItem> {
        let quantity = self
            .quantity
            .ok_or_else(|| ParseError::MissingField(self.field("qCom")))?;
        let unit_price = self
            .unit_price
            .ok_or_else(|| ParseError::MissingField(self.field("vUnCom")))?;
        let total_price = self
            .total_price
            .ok_or_else(|| ParseError::MissingField(self.field("vProd")))?;

        Ok(InvoiceItem {
            number: self.number,
            product_code: self.product_code,
            description: self.description,
            ncm: self.ncm,
            cfop: self.cfop,
            cst: self.cst,
            unit: self.unit,
            quantity,
            unit_price,
            total_price,
            taxes: self.taxes,
        })
    }
}

/// Document being assembled from parser events.
#[derive(Default)]
struct DocumentDraft {
    root: Option<String>,
    info_kind: Option<DocumentType>,
    info_id: Option<String>,
    model_code: Option<String>,
    protocol_key: Option<String>,
    header: InvoiceHeader,
    issuer_id: Option<String>,
    issuer: Party,
    recipient_id: Option<String>,
    recipient: Party,
    items: Vec<InvoiceItem>,
    current_item: Option<ItemDraft>,
    totals: InvoiceTotals,
}

impl DocumentDraft {
    fn on_start(&mut self, name: &str, e: &BytesStart<'_>) -> Result<()> {
        if self.root.is_none() {
            self.root = Some(name.to_string());
        }

        match name {
            "infNFe" | "infCte" | "infMDFe" if self.info_kind.is_none() => {
                self.info_kind = Some(match name {
                    "infNFe" => DocumentType::NFe,
                    "infCte" => DocumentType::CTe,
                    _ => DocumentType::MDFe,
                });
                self.info_id = attribute(e, b"Id")?;
            }
            "det" => {
                let position = self.items.len() as u32 + 1;
                let number = attribute(e, b"nItem")?
                    .and_then(|n| n.trim().parse().ok())
                    .unwrap_or(position);
                self.current_item = Some(ItemDraft::new(number));
            }
            _ => {}
        }

        Ok(())
    }

    fn on_end(&mut self, path: &[String], value: &str) -> Result<()> {
        let Some((name, parents)) = path.split_last() else {
            return Ok(());
        };

        if name == "det" {
            if let Some(item) = self.current_item.take() {
                self.items.push(item.finish()?);
            }
            return Ok(());
        }

        if value.is_empty() {
            return Ok(());
        }

        if self.current_item.is_some() && parents.iter().any(|p| p == "det") {
            return self.on_item_value(name, parents, value);
        }

        let parent = parents.last().map(String::as_str).unwrap_or("");
        match (parent, name.as_str()) {
            ("ide", "mod") => self.model_code = Some(value.to_string()),
            ("ide", "nNF" | "nCT" | "nMDF") => self.header.number = Some(value.to_string()),
            ("ide", "serie") => self.header.series = Some(value.to_string()),
            ("ide", "natOp") => self.header.nature_of_operation = Some(value.to_string()),
            ("ide", "dhEmi") => self.header.issue_date = Some(parse_datetime_date("ide/dhEmi", value)?),
            ("ide", "dEmi") => self.header.issue_date = Some(parse_date("ide/dEmi", value)?),
            ("emit", "CNPJ" | "CPF") => self.issuer_id = Some(value.to_string()),
            ("emit", "xNome") => self.issuer.name = value.to_string(),
            ("enderEmit", "UF") => self.issuer.state = Some(value.to_string()),
            ("dest", "CNPJ" | "CPF" | "idEstrangeiro") => self.recipient_id = Some(value.to_string()),
            ("dest", "xNome") => self.recipient.name = value.to_string(),
            ("enderDest", "UF") => self.recipient.state = Some(value.to_string()),
            ("ICMSTot", field) => self.on_total(field, value)?,
            ("infProt", "chNFe" | "chCTe" | "chMDFe") => self.protocol_key = Some(value.to_string()),
            _ => {}
        }

        Ok(())
    }

    fn on_item_value(&mut self, name: &str, parents: &[String], value: &str) -> Result<()> {
        let Some(item) = self.current_item.as_mut() else {
            return Ok(());
        };
        let parent = parents.last().map(String::as_str).unwrap_or("");
        let within = |tag: &str| parents.iter().any(|p| p == tag);

        match (parent, name) {
            ("prod", "cProd") => item.product_code = Some(value.to_string()),
            ("prod", "xProd") => item.description = value.to_string(),
            ("prod", "NCM") => item.ncm = Some(value.to_string()),
            ("prod", "CFOP") => item.cfop = Some(value.to_string()),
            ("prod", "uCom") => item.unit = Some(value.to_string()),
            ("prod", "qCom") => item.quantity = Some(parse_decimal(&item.field("qCom"), value)?),
            ("prod", "vUnCom") => {
                item.unit_price = Some(parse_decimal(&item.field("vUnCom"), value)?)
            }
            ("prod", "vProd") => {
                item.total_price = Some(parse_decimal(&item.field("vProd"), value)?)
            }
            (_, "CST" | "CSOSN") if within("ICMS") => item.cst = Some(value.to_string()),
            (_, "vICMS") if within("ICMS") => {
                item.taxes.icms = parse_decimal(&item.field("vICMS"), value)?
            }
            (_, "vIPI") if within("IPI") => item.taxes.ipi = parse_decimal(&item.field("vIPI"), value)?,
            (_, "vPIS") if within("PIS") => item.taxes.pis = parse_decimal(&item.field("vPIS"), value)?,
            (_, "vCOFINS") if within("COFINS") => {
                item.taxes.cofins = parse_decimal(&item.field("vCOFINS"), value)?
            }
            _ => {}
        }

        Ok(())
    }

    fn on_total(&mut self, name: &str, value: &str) -> Result<()> {
        let slot = match name {
            "vProd" => &mut self.totals.total_products,
            "vNF" => &mut self.totals.total_invoice,
            "vICMS" => &mut self.totals.icms,
            "vST" => &mut self.totals.icms_st,
            "vIPI" => &mut self.totals.ipi,
            "vPIS" => &mut self.totals.pis,
            "vCOFINS" => &mut self.totals.cofins,
            "vFrete" => &mut self.totals.freight,
            "vSeg" => &mut self.totals.insurance,
            "vDesc" => &mut self.totals.discount,
            "vOutro" => &mut self.totals.other,
            _ => return Ok(()),
        };
        *slot = parse_decimal(&format!("ICMSTot/{}", name), value)?;
        Ok(())
    }

    fn document_type(&self) -> Result<DocumentType> {
        match (&self.model_code, self.info_kind) {
            (Some(code), _) => DocumentType::from_model_code(code)
                .ok_or_else(|| ParseError::UnsupportedDocument(format!("model code {}", code))),
            (None, Some(kind)) => Ok(kind),
            (None, None) => Err(ParseError::UnsupportedDocument(
                self.root.clone().unwrap_or_default(),
            )),
        }
    }

    fn finish(self) -> Result<Invoice> {
        let document_type = self.document_type()?;

        let document_key = self
            .info_id
            .as_deref()
            .map(|id| id.trim().trim_start_matches(|c: char| c.is_ascii_alphabetic()))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or(self.protocol_key)
            .ok_or_else(|| ParseError::MissingField("document_key".to_string()))?;

        let issuer_id = self
            .issuer_id
            .ok_or_else(|| ParseError::MissingField("issuer_id".to_string()))?;

        debug!(
            "Parsed {} {} issued by {} ({} items)",
            document_type,
            document_key,
            issuer_id,
            self.items.len()
        );

        Ok(Invoice {
            document_key,
            document_type,
            header: self.header,
            issuer_id,
            issuer: self.issuer,
            recipient_id: self.recipient_id,
            recipient: self.recipient,
            items: self.items,
            totals: self.totals,
        })
    }
}

fn xml<E: std::fmt::Display>(e: E) -> ParseError {
    ParseError::Xml(e.to_string())
}

fn local_name(e: &BytesStart<'_>) -> Result<String> {
    let name = e.local_name();
    std::str::from_utf8(name.as_ref())
        .map(str::to_string)
        .map_err(xml)
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml)?;
        if attr.key.local_name().as_ref() == key {
            let value = attr.unescape_value().map_err(xml)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parse an exact decimal. Never defaults: a bad value is an error.
fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str_exact(value.trim()).map_err(|_| ParseError::InvalidDecimal {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ParseError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Date part of an emission timestamp; the issuer's local date is kept.
fn parse_datetime_date(field: &str, value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::from_str(value) {
        return Ok(dt.date());
    }
    parse_date(field, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SAMPLE_KEY, sample_nfe_xml};
    use pretty_assertions::assert_eq;

    fn parse(xml: &str) -> Result<Invoice> {
        NfeParser::new().normalize(xml.as_bytes())
    }

    #[test]
    fn test_parse_sample_nfe() {
        let invoice = parse(&sample_nfe_xml()).unwrap();

        assert_eq!(invoice.document_key, SAMPLE_KEY);
        assert_eq!(invoice.document_type, DocumentType::NFe);
        assert_eq!(invoice.issuer_id, "11222333000181");
        assert_eq!(invoice.issuer.name, "ACME INDUSTRIA E COMERCIO LTDA");
        assert_eq!(invoice.issuer.state.as_deref(), Some("SP"));
        assert_eq!(invoice.recipient_id.as_deref(), Some("45997418000153"));
        assert_eq!(invoice.header.number.as_deref(), Some("123"));
        assert_eq!(
            invoice.header.issue_date,
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );

        assert_eq!(invoice.items.len(), 1);
        let item = &invoice.items[0];
        assert_eq!(item.number, 1);
        assert_eq!(item.ncm.as_deref(), Some("84713012"));
        assert_eq!(item.cfop.as_deref(), Some("5102"));
        assert_eq!(item.cst.as_deref(), Some("00"));
        assert_eq!(item.quantity, Decimal::from_str("10.0000").unwrap());
        assert_eq!(item.unit_price, Decimal::from_str("100.00").unwrap());
        assert_eq!(item.total_price, Decimal::from_str("1000.00").unwrap());
        assert_eq!(item.taxes.icms, Decimal::from_str("180.00").unwrap());
        assert_eq!(item.taxes.ipi, Decimal::from_str("100.00").unwrap());

        assert_eq!(invoice.totals.total_products, Decimal::from_str("1000.00").unwrap());
        assert_eq!(invoice.totals.total_invoice, Decimal::from_str("1100.00").unwrap());
        assert_eq!(invoice.totals.ipi, Decimal::from_str("100.00").unwrap());
        assert_eq!(invoice.totals.freight, Decimal::ZERO);
    }

    #[test]
    fn test_nfce_model_code() {
        let xml = sample_nfe_xml().replace("<mod>55</mod>", "<mod>65</mod>");
        assert_eq!(parse(&xml).unwrap().document_type, DocumentType::NFCe);
    }

    #[test]
    fn test_unknown_model_code_is_unsupported() {
        let xml = sample_nfe_xml().replace("<mod>55</mod>", "<mod>99</mod>");
        assert!(matches!(parse(&xml), Err(ParseError::UnsupportedDocument(_))));
    }

    #[test]
    fn test_unrelated_xml_is_unsupported() {
        let err = parse("<catalog><book>Dom Casmurro</book></catalog>").unwrap_err();
        assert_eq!(err, ParseError::UnsupportedDocument("catalog".to_string()));
    }

    #[test]
    fn test_cte_from_info_element() {
        let xml = r#"<cteProc><CTe><infCte Id="CTe35240111222333000181570010000000011000000015" versao="4.00">
            <ide><nCT>1</nCT><dhEmi>2024-02-01T08:00:00-03:00</dhEmi></ide>
            <emit><CNPJ>11222333000181</CNPJ><xNome>TRANSPORTES ACME</xNome></emit>
        </infCte></CTe></cteProc>"#;
        let invoice = parse(xml).unwrap();
        assert_eq!(invoice.document_type, DocumentType::CTe);
        assert_eq!(invoice.document_key, "35240111222333000181570010000000011000000015");
        assert!(invoice.items.is_empty());
    }

    #[test]
    fn test_missing_issuer_is_error() {
        let xml = sample_nfe_xml().replace("<CNPJ>11222333000181</CNPJ>", "");
        assert_eq!(
            parse(&xml).unwrap_err(),
            ParseError::MissingField("issuer_id".to_string())
        );
    }

    #[test]
    fn test_key_falls_back_to_protocol() {
        let xml = sample_nfe_xml().replace(&format!(r#"Id="NFe{}""#, SAMPLE_KEY), "");
        assert_eq!(parse(&xml).unwrap().document_key, SAMPLE_KEY);
    }

    #[test]
    fn test_missing_key_is_error() {
        let xml = sample_nfe_xml()
            .replace(&format!(r#"Id="NFe{}""#, SAMPLE_KEY), "")
            .replace(&format!("<chNFe>{}</chNFe>", SAMPLE_KEY), "");
        assert_eq!(
            parse(&xml).unwrap_err(),
            ParseError::MissingField("document_key".to_string())
        );
    }

    #[test]
    fn test_invalid_decimal_is_not_defaulted() {
        let xml = sample_nfe_xml().replace("<vNF>1100.00</vNF>", "<vNF>1.100,00</vNF>");
        assert_eq!(
            parse(&xml).unwrap_err(),
            ParseError::InvalidDecimal {
                field: "ICMSTot/vNF".to_string(),
                value: "1.100,00".to_string(),
            }
        );
    }

    #[test]
    fn test_item_without_quantity_is_error() {
        let xml = sample_nfe_xml().replace("<qCom>10.0000</qCom>", "");
        assert_eq!(
            parse(&xml).unwrap_err(),
            ParseError::MissingField("det[1]/qCom".to_string())
        );
    }

    #[test]
    fn test_doctype_is_rejected() {
        let xml = format!(
            "<?xml version=\"1.0\"?>\n<!DOCTYPE nfeProc [<!ENTITY xxe SYSTEM \"file:///etc/passwd\">]>\n{}",
            sample_nfe_xml().replace("ACME INDUSTRIA", "&xxe; INDUSTRIA")
        );
        assert_eq!(parse(&xml).unwrap_err(), ParseError::DoctypeForbidden);
    }

    #[test]
    fn test_undeclared_entity_is_rejected() {
        let xml = sample_nfe_xml().replace("ACME INDUSTRIA", "&xxe; INDUSTRIA");
        assert!(matches!(parse(&xml), Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_predefined_entities_are_resolved() {
        let xml = sample_nfe_xml().replace("ACME INDUSTRIA E COMERCIO", "ACME INDUSTRIA &amp; COMERCIO");
        assert_eq!(
            parse(&xml).unwrap().issuer.name,
            "ACME INDUSTRIA & COMERCIO LTDA"
        );
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(parse("<nfeProc><NFe></nfeProc>"), Err(ParseError::Xml(_))));
        assert!(matches!(parse("<nfeProc><NFe>"), Err(ParseError::Xml(_))));
        assert!(matches!(parse(""), Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_size_limit() {
        let parser = NfeParser::new().with_max_bytes(16);
        assert!(matches!(
            parser.normalize(sample_nfe_xml().as_bytes()),
            Err(ParseError::Xml(_))
        ));
    }

    #[test]
    fn test_zero_items_parse() {
        let xml = crate::testing::sample_nfe_xml_without_items();
        let invoice = parse(&xml).unwrap();
        assert!(invoice.items.is_empty());
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(
            parse_datetime_date("f", "2024-01-15T23:30:00-03:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            parse_datetime_date("f", "2024-01-15T23:30:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            parse_datetime_date("f", "2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert!(parse_datetime_date("f", "15/01/2024").is_err());
    }
}
