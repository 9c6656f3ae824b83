//! Canonical fiscal document model (NF-e / NFC-e / CT-e / MDF-e).

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A normalized fiscal document.
///
/// Built once by the normalizer and only read afterwards. Format and
/// arithmetic invariants are checked by validation rules, not enforced here,
/// so malformed documents still parse and get reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// 44-digit access key (chave de acesso).
    pub document_key: String,

    /// Fiscal model of the document.
    pub document_type: DocumentType,

    /// Header data (number, series, nature of operation, dates).
    pub header: InvoiceHeader,

    /// Issuer tax identifier (CNPJ or CPF digits).
    pub issuer_id: String,

    /// Issuer (emitente) details.
    pub issuer: Party,

    /// Recipient tax identifier, when the document names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,

    /// Recipient (destinatário) details.
    pub recipient: Party,

    /// Line items in document order.
    pub items: Vec<InvoiceItem>,

    /// Declared totals.
    pub totals: InvoiceTotals,
}

/// Fiscal document model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// Nota Fiscal eletrônica (model 55).
    NFe,
    /// Nota Fiscal de Consumidor eletrônica (model 65).
    NFCe,
    /// Conhecimento de Transporte eletrônico (model 57).
    CTe,
    /// Manifesto Eletrônico de Documentos Fiscais (model 58).
    MDFe,
}

impl DocumentType {
    /// Resolve the `mod` code found in the document header.
    pub fn from_model_code(code: &str) -> Option<Self> {
        match code.trim() {
            "55" => Some(DocumentType::NFe),
            "65" => Some(DocumentType::NFCe),
            "57" => Some(DocumentType::CTe),
            "58" => Some(DocumentType::MDFe),
            _ => None,
        }
    }

    /// The two-digit model code.
    pub fn model_code(&self) -> &'static str {
        match self {
            DocumentType::NFe => "55",
            DocumentType::NFCe => "65",
            DocumentType::CTe => "57",
            DocumentType::MDFe => "58",
        }
    }

    /// Whether the model carries product line items and ICMS totals.
    pub fn carries_items(&self) -> bool {
        matches!(self, DocumentType::NFe | DocumentType::NFCe)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentType::NFe => "NFe",
            DocumentType::NFCe => "NFCe",
            DocumentType::CTe => "CTe",
            DocumentType::MDFe => "MDFe",
        };
        f.write_str(name)
    }
}

/// Document header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    /// Document number (nNF).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,

    /// Series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    /// Nature of operation as declared by the issuer (natOp).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nature_of_operation: Option<String>,

    /// Issue date. Checked against "today" by validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
}

/// Issuer or recipient details other than the tax id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Legal or trade name.
    pub name: String,

    /// Federal unit (UF), e.g. "SP".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// A single line item (det).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Item number (nItem).
    pub number: u32,

    /// Issuer product code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,

    /// Product description.
    pub description: String,

    /// Mercosur nomenclature code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ncm: Option<String>,

    /// Fiscal operation code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfop: Option<String>,

    /// ICMS tax situation (CST or CSOSN).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cst: Option<String>,

    /// Commercial unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Quantity.
    pub quantity: Decimal,

    /// Unit price.
    pub unit_price: Decimal,

    /// Declared line total.
    pub total_price: Decimal,

    /// Per-item tax amounts.
    #[serde(default)]
    pub taxes: ItemTaxes,
}

impl InvoiceItem {
    /// Quantity times unit price, or `None` on decimal overflow.
    pub fn expected_total(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// Tax amounts for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTaxes {
    pub icms: Decimal,
    pub ipi: Decimal,
    pub pis: Decimal,
    pub cofins: Decimal,
}

/// Declared document totals (ICMSTot).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    /// Sum of products (vProd).
    pub total_products: Decimal,

    /// Document total (vNF).
    pub total_invoice: Decimal,

    /// ICMS (vICMS).
    #[serde(default)]
    pub icms: Decimal,

    /// ICMS substituição tributária (vST).
    #[serde(default)]
    pub icms_st: Decimal,

    /// IPI (vIPI).
    #[serde(default)]
    pub ipi: Decimal,

    /// PIS (vPIS).
    #[serde(default)]
    pub pis: Decimal,

    /// COFINS (vCOFINS).
    #[serde(default)]
    pub cofins: Decimal,

    /// Freight (vFrete).
    #[serde(default)]
    pub freight: Decimal,

    /// Insurance (vSeg).
    #[serde(default)]
    pub insurance: Decimal,

    /// Discount (vDesc).
    #[serde(default)]
    pub discount: Decimal,

    /// Other charges (vOutro).
    #[serde(default)]
    pub other: Decimal,
}

impl InvoiceTotals {
    /// Document total implied by the component totals, or `None` on decimal
    /// overflow.
    ///
    /// ICMS, PIS and COFINS are embedded in product prices; ST and IPI are
    /// added on top.
    pub fn computed_invoice_total(&self) -> Option<Decimal> {
        checked_sum([
            self.total_products,
            -self.discount,
            self.icms_st,
            self.freight,
            self.insurance,
            self.other,
            self.ipi,
        ])
    }
}

impl Invoice {
    /// Create an invoice with the identity fields set and everything else empty.
    pub fn new(
        document_key: impl Into<String>,
        document_type: DocumentType,
        issuer_id: impl Into<String>,
    ) -> Self {
        Self {
            document_key: document_key.into(),
            document_type,
            header: InvoiceHeader::default(),
            issuer_id: issuer_id.into(),
            issuer: Party::default(),
            recipient_id: None,
            recipient: Party::default(),
            items: Vec::new(),
            totals: InvoiceTotals::default(),
        }
    }

    /// CFOP of the first item.
    pub fn primary_cfop(&self) -> Option<&str> {
        self.items.first().and_then(|i| i.cfop.as_deref())
    }

    /// NCM of the first item.
    pub fn primary_ncm(&self) -> Option<&str> {
        self.items.first().and_then(|i| i.ncm.as_deref())
    }

    /// Distinct NCM codes in item order.
    pub fn ncm_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        for ncm in self.items.iter().filter_map(|i| i.ncm.as_deref()) {
            if !codes.contains(&ncm) {
                codes.push(ncm);
            }
        }
        codes
    }

    /// Sum of declared item totals, or `None` on decimal overflow.
    pub fn items_total(&self) -> Option<Decimal> {
        checked_sum(self.items.iter().map(|i| i.total_price))
    }
}

fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}
