//! Issuer-name pattern and NCM prefix lookups.

use crate::models::config::{IssuerPattern, NcmMapping};
use crate::models::invoice::Invoice;

/// Uppercase, strip Portuguese accents and turn punctuation into spaces.
pub fn fold(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_uppercase)
        .map(|c| match c {
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'Ç' => 'C',
            'Ñ' => 'N',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A pattern-table hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuerMatch<'a> {
    pub cost_center: &'a str,
    pub keyword: &'a str,
}

/// First pattern with a keyword appearing as whole words in the issuer name.
pub fn match_issuer<'a>(issuer_name: &str, patterns: &'a [IssuerPattern]) -> Option<IssuerMatch<'a>> {
    let name = format!(" {} ", fold(issuer_name));
    if name.trim().is_empty() {
        return None;
    }

    patterns.iter().find_map(|pattern| {
        pattern
            .keywords
            .iter()
            .find(|keyword| {
                let keyword = fold(keyword);
                !keyword.is_empty() && name.contains(&format!(" {} ", keyword))
            })
            .map(|keyword| IssuerMatch {
                cost_center: &pattern.cost_center,
                keyword,
            })
    })
}

/// An NCM-table hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NcmMatch<'a, 'b> {
    pub cost_center: &'a str,
    pub prefix: &'a str,
    pub ncm: &'b str,
}

/// Longest mapped prefix across all item NCMs. Ties go to the earlier item,
/// then the earlier table row.
pub fn match_ncm<'a, 'b>(invoice: &'b Invoice, mappings: &'a [NcmMapping]) -> Option<NcmMatch<'a, 'b>> {
    let mut best: Option<NcmMatch<'a, 'b>> = None;

    for ncm in invoice.ncm_codes() {
        for mapping in mappings {
            let prefix = mapping.prefix.trim();
            if prefix.is_empty() || !ncm.starts_with(prefix) {
                continue;
            }
            if best.is_none_or(|b| prefix.len() > b.prefix.len()) {
                best = Some(NcmMatch {
                    cost_center: &mapping.cost_center,
                    prefix,
                    ncm,
                });
            }
        }
    }

    best
}
