//! Fiscal XML normalization.

mod parser;

pub use parser::NfeParser;

use crate::error::ParseError;
use crate::models::invoice::Invoice;

/// Result type for normalization.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Trait for turning raw document bytes into a canonical [`Invoice`].
pub trait DocumentNormalizer {
    /// Parse one document. Fails without returning a partial invoice.
    fn normalize(&self, raw: &[u8]) -> Result<Invoice>;
}

/// Normalize raw XML with the default parser settings.
pub fn normalize(raw: &[u8]) -> Result<Invoice> {
    NfeParser::new().normalize(raw)
}
