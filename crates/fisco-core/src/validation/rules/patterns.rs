//! Common regex patterns for fiscal identifiers and codes.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Access key (chave de acesso)
    pub static ref DOCUMENT_KEY: Regex = Regex::new(r"^[0-9]{44}$").unwrap();

    // Tax identifiers
    pub static ref CNPJ: Regex = Regex::new(r"^[0-9]{14}$").unwrap();

    pub static ref CPF: Regex = Regex::new(r"^[0-9]{11}$").unwrap();

    pub static ref DIGITS_ONLY: Regex = Regex::new(r"^[0-9]+$").unwrap();

    // CFOP: first digit is the operation group (1-3 inbound, 5-7 outbound)
    pub static ref CFOP: Regex = Regex::new(r"^[1-35-7][0-9]{3}$").unwrap();

    // NCM: 8 digits, or "00" for services
    pub static ref NCM: Regex = Regex::new(r"^(?:[0-9]{8}|00)$").unwrap();
}
