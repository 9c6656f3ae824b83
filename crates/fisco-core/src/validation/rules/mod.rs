//! Built-in validation rules for Brazilian fiscal documents.

pub mod amounts;
pub mod cfop;
pub mod dates;
pub mod document_key;
pub mod patterns;
pub mod presence;
pub mod tax_id;

pub use document_key::validate_document_key;
pub use tax_id::{validate_cnpj, validate_cpf};

/// Field path of an item attribute, e.g. `items[0].cfop`.
pub(crate) fn item_field(index: usize, attribute: &str) -> String {
    format!("items[{}].{}", index, attribute)
}
