//! # Import Module
//!
//! Parser for the catalog import file: comma-separated, one record per line,
//! first line a header.
//!
//! ## Row Shape
//! ```text
//! name , barcode , price [, category [, costPrice [, bulkPrice ]]]
//! ───┬─  ───┬───   ──┬──
//!    └──────┴────────┴──── must all be non-empty, price must parse and be ≥ 0
//!
//! "Rice, 5kg",6001234,4500,Grains   ──►  name = Rice, 5kg
//! "Say ""hi""",,100                 ──►  skipped (barcode empty)
//! ```
//!
//! Rows that fail the shape check are counted, not reported one by one.

use crate::money::Money;
use crate::types::ItemDraft;

/// Result of parsing an import file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedImport {
    pub rows: Vec<ItemDraft>,
    /// Data lines that were not blank but failed the shape check.
    pub skipped: usize,
}

/// Splits one line into fields, honouring double quotes.
///
/// Inside quotes a comma is literal and `""` is an escaped quote.
/// Fields are trimmed.
///
/// ## Example
/// ```rust
/// use tally_core::import::split_record;
///
/// assert_eq!(
///     split_record(r#""Rice, 5kg",600123,"4,500""#),
///     vec!["Rice, 5kg", "600123", "4,500"]
/// );
/// ```
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Parses the whole import text into item drafts.
///
/// The header line is skipped, blank lines are ignored and CRLF line endings
/// are accepted. Optional money columns that fail to parse are dropped
/// without rejecting the row.
pub fn parse_catalog_import(raw: &str) -> ParsedImport {
    let mut parsed = ParsedImport::default();

    for line in raw.lines().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(&split_record(line)) {
            Some(draft) => parsed.rows.push(draft),
            None => parsed.skipped += 1,
        }
    }

    parsed
}

fn parse_row(fields: &[String]) -> Option<ItemDraft> {
    if fields.len() < 3 || fields[..3].iter().any(|f| f.is_empty()) {
        return None;
    }

    let price = Money::parse(&fields[2]).ok().filter(|p| !p.is_negative())?;
    let optional_money = |idx: usize| {
        fields
            .get(idx)
            .filter(|f| !f.is_empty())
            .and_then(|f| Money::parse(f).ok())
            .filter(|m| !m.is_negative())
    };

    Some(ItemDraft {
        name: fields[0].clone(),
        barcode: fields[1].clone(),
        price,
        category: fields.get(3).filter(|c| !c.is_empty()).cloned(),
        cost_price: optional_money(4),
        bulk_price: optional_money(5),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
