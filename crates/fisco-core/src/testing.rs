//! Shared fixtures for unit tests.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::invoice::*;

/// Valid 44-digit key for issuer 11222333000181, model 55.
pub const SAMPLE_KEY: &str = "35240111222333000181550010000001231123456780";

/// Valid issuer CNPJ used by the samples.
pub const SAMPLE_ISSUER: &str = "11222333000181";

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

/// Single-item NF-e that passes every built-in rule.
pub fn sample_nfe_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe{key}" versao="4.00">
      <ide>
        <cUF>35</cUF>
        <natOp>VENDA DE MERCADORIA</natOp>
        <mod>55</mod>
        <serie>1</serie>
        <nNF>123</nNF>
        <dhEmi>2024-01-15T10:30:00-03:00</dhEmi>
      </ide>
      <emit>
        <CNPJ>{issuer}</CNPJ>
        <xNome>ACME INDUSTRIA E COMERCIO LTDA</xNome>
        <enderEmit><xMun>SAO PAULO</xMun><UF>SP</UF></enderEmit>
      </emit>
      <dest>
        <CNPJ>45997418000153</CNPJ>
        <xNome>CLIENTE EXEMPLO S.A.</xNome>
        <enderDest><UF>RJ</UF></enderDest>
      </dest>
      <det nItem="1">
        <prod>
          <cProd>NB-001</cProd>
          <xProd>NOTEBOOK 14 POL</xProd>
          <NCM>84713012</NCM>
          <CFOP>5102</CFOP>
          <uCom>UN</uCom>
          <qCom>10.0000</qCom>
          <vUnCom>100.00</vUnCom>
          <vProd>1000.00</vProd>
        </prod>
        <imposto>
          <ICMS><ICMS00><orig>0</orig><CST>00</CST><vBC>1000.00</vBC><pICMS>18.00</pICMS><vICMS>180.00</vICMS></ICMS00></ICMS>
          <IPI><cEnq>999</cEnq><IPITrib><CST>50</CST><vIPI>100.00</vIPI></IPITrib></IPI>
          <PIS><PISAliq><CST>01</CST><vPIS>16.50</vPIS></PISAliq></PIS>
          <COFINS><COFINSAliq><CST>01</CST><vCOFINS>76.00</vCOFINS></COFINSAliq></COFINS>
        </imposto>
      </det>
      <total>
        <ICMSTot>
          <vBC>1000.00</vBC>
          <vICMS>180.00</vICMS>
          <vST>0.00</vST>
          <vProd>1000.00</vProd>
          <vFrete>0.00</vFrete>
          <vSeg>0.00</vSeg>
          <vDesc>0.00</vDesc>
          <vIPI>100.00</vIPI>
          <vPIS>16.50</vPIS>
          <vCOFINS>76.00</vCOFINS>
          <vOutro>0.00</vOutro>
          <vNF>1100.00</vNF>
        </ICMSTot>
      </total>
    </infNFe>
  </NFe>
  <protNFe versao="4.00">
    <infProt>
      <chNFe>{key}</chNFe>
      <cStat>100</cStat>
    </infProt>
  </protNFe>
</nfeProc>
"#,
        key = SAMPLE_KEY,
        issuer = SAMPLE_ISSUER,
    )
}

/// The sample document with its only item removed.
pub fn sample_nfe_xml_without_items() -> String {
    let xml = sample_nfe_xml();
    match (xml.find("<det "), xml.find("</det>")) {
        (Some(start), Some(end)) => format!("{}{}", &xml[..start], &xml[end + "</det>".len()..]),
        _ => xml,
    }
}

/// In-memory equivalent of [`sample_nfe_xml`].
pub fn sample_invoice() -> Invoice {
    let mut invoice = Invoice::new(SAMPLE_KEY, DocumentType::NFe, SAMPLE_ISSUER);
    invoice.header = InvoiceHeader {
        number: Some("123".to_string()),
        series: Some("1".to_string()),
        nature_of_operation: Some("VENDA DE MERCADORIA".to_string()),
        issue_date: NaiveDate::from_ymd_opt(2024, 1, 15),
    };
    invoice.issuer = Party {
        name: "ACME INDUSTRIA E COMERCIO LTDA".to_string(),
        state: Some("SP".to_string()),
    };
    invoice.recipient_id = Some("45997418000153".to_string());
    invoice.recipient = Party {
        name: "CLIENTE EXEMPLO S.A.".to_string(),
        state: Some("RJ".to_string()),
    };
    invoice.items.push(sample_item(1, "84713012", "5102", "10", "100.00"));
    invoice.totals = InvoiceTotals {
        total_products: dec("1000.00"),
        total_invoice: dec("1100.00"),
        icms: dec("180.00"),
        ipi: dec("100.00"),
        pis: dec("16.50"),
        cofins: dec("76.00"),
        ..Default::default()
    };
    invoice
}

/// Item whose declared total equals quantity times unit price.
pub fn sample_item(number: u32, ncm: &str, cfop: &str, quantity: &str, unit_price: &str) -> InvoiceItem {
    let quantity = dec(quantity);
    let unit_price = dec(unit_price);
    InvoiceItem {
        number,
        product_code: Some(format!("P{:03}", number)),
        description: format!("PRODUTO {}", number),
        ncm: Some(ncm.to_string()),
        cfop: Some(cfop.to_string()),
        cst: Some("00".to_string()),
        unit: Some("UN".to_string()),
        quantity,
        unit_price,
        total_price: quantity * unit_price,
        taxes: ItemTaxes::default(),
    }
}
