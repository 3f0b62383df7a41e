//! PDF Statement Import Module
//!
//! Turns broker statement PDFs into plain text and provides the shared
//! helpers the broker parsers are built on: European amount tokens,
//! ISIN recognition, parse warnings and the error type.

pub mod positions;
pub mod trade_republic;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use thiserror::Error;

/// PDF magic bytes
const PDF_MAGIC: &[u8] = b"%PDF";
/// Default maximum PDF file size (100 MB)
pub const DEFAULT_MAX_PDF_SIZE: usize = 100 * 1024 * 1024;

// Pre-compiled regexes for the amount and identifier patterns
static RE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3}(?:\.\d{3})*,\d{2})").unwrap());
static RE_AMOUNT_EUR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:\.\d{3})*,\d{2})\s*EUR").unwrap());
static RE_ISIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{2}[A-Z0-9]{9}\d)\b").unwrap());

/// Errors raised while importing a statement
#[derive(Error, Debug)]
pub enum StatementError {
    #[error("Malformed PDF document: {1}")]
    MalformedDocument(MalformedKind, String),

    #[error("PDF too large ({size} bytes). Maximum: {max} bytes")]
    DocumentTooLarge { size: usize, max: usize },

    #[error("Could not read the balance from the cash statement")]
    BalanceNotFound,

    #[error("Could not read the portfolio total from the securities statement")]
    PortfolioTotalNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Import task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, StatementError>;

/// Where a document was found to be unreadable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// Rejected before parsing: too short or no `%PDF` header
    Header,
    /// The PDF container itself could not be read
    Content,
}

impl StatementError {
    /// Whether the bytes were rejected before any PDF parsing took place
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedDocument(MalformedKind::Header, _) | Self::DocumentTooLarge { .. }
        )
    }
}

/// Limits applied to uploaded PDFs before extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportLimits {
    pub max_pdf_size: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_pdf_size: DEFAULT_MAX_PDF_SIZE,
        }
    }
}

/// Severity of a parse warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningSeverity {
    Info,
    Warning,
    Error,
}

/// Something the parser had to guess or default while reading a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub field: String,
    pub message: String,
    pub raw_value: String,
    pub severity: WarningSeverity,
}

impl ParseWarning {
    pub fn new(
        severity: WarningSeverity,
        field: &str,
        message: impl Into<String>,
        raw_value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            raw_value: raw_value.into(),
            severity,
        }
    }
}

/// Check size and header before handing bytes to the PDF parser
pub fn validate_pdf(bytes: &[u8], limits: &ImportLimits) -> Result<()> {
    if bytes.len() < 8 {
        return Err(StatementError::MalformedDocument(
            MalformedKind::Header,
            "file too small to be a PDF".to_string(),
        ));
    }

    if bytes.len() > limits.max_pdf_size {
        return Err(StatementError::DocumentTooLarge {
            size: bytes.len(),
            max: limits.max_pdf_size,
        });
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return Err(StatementError::MalformedDocument(
            MalformedKind::Header,
            "PDF header missing".to_string(),
        ));
    }

    Ok(())
}

/// Extract the text of every page, in page order
///
/// A page without extractable text yields an empty string so that page
/// positions stay stable.
pub fn extract_pdf_pages(bytes: &[u8], limits: &ImportLimits) -> Result<Vec<String>> {
    validate_pdf(bytes, limits)?;

    // pdf-extract panics on some corrupt streams
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    match outcome {
        Ok(Ok(pages)) => {
            log::info!("PDF Import: Extracted {} page(s)", pages.len());
            Ok(pages)
        }
        Ok(Err(e)) => {
            log::error!("PDF Import: Failed to extract text: {}", e);
            Err(StatementError::MalformedDocument(
                MalformedKind::Content,
                e.to_string(),
            ))
        }
        Err(_) => {
            log::error!("PDF Import: PDF parser panicked");
            Err(StatementError::MalformedDocument(
                MalformedKind::Content,
                "PDF parser aborted on unreadable content".to_string(),
            ))
        }
    }
}

/// Extract the whole document as one newline-joined text blob
pub fn extract_pdf_text(bytes: &[u8], limits: &ImportLimits) -> Result<String> {
    Ok(extract_pdf_pages(bytes, limits)?.join("\n"))
}

/// Read a PDF from disk and extract its text
pub fn extract_pdf_text_from_path(pdf_path: &Path, limits: &ImportLimits) -> Result<String> {
    let bytes = std::fs::read(pdf_path)?;
    extract_pdf_text(&bytes, limits)
}

/// Parse a European decimal number (1.234,56 -> 1234.56)
pub fn parse_european_decimal(s: &str) -> Option<f64> {
    let cleaned = s
        .trim()
        .replace('.', "") // Remove thousand separators
        .replace(',', "."); // Convert decimal separator

    cleaned.parse::<f64>().ok()
}

/// All amount tokens in a line, left to right
pub fn find_amounts(line: &str) -> Vec<f64> {
    RE_AMOUNT
        .captures_iter(line)
        .filter_map(|c| parse_european_decimal(&c[1]))
        .collect()
}

/// Rightmost amount token in a line
pub fn last_amount(line: &str) -> Option<f64> {
    find_amounts(line).pop()
}

/// First amount token followed by an `EUR` suffix
pub fn first_eur_amount(line: &str) -> Option<f64> {
    RE_AMOUNT_EUR
        .captures(line)
        .and_then(|c| parse_european_decimal(&c[1]))
}

/// Extract ISIN from text (2 letters, 9 alphanumerics, 1 check digit)
pub fn extract_isin(text: &str) -> Option<&str> {
    RE_ISIN.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}


#[cfg(test)]
mod tests {
    use super::test_support::statement_pdf;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_european_decimal() {
        assert_eq!(parse_european_decimal("62.348,68"), Some(62348.68));
        assert_eq!(parse_european_decimal("14,00"), Some(14.0));
        assert_eq!(parse_european_decimal("1.234.567,89"), Some(1234567.89));
        assert_eq!(parse_european_decimal("abc"), None);
    }

    #[test]
    fn test_find_amounts() {
        let line = "Conto corrente 2.646,02 € 4.528,82 €";
        assert_eq!(find_amounts(line), vec![2646.02, 4528.82]);
        assert_eq!(last_amount(line), Some(4528.82));
        assert_eq!(last_amount("Pagina 1 di 3"), None);
    }

    #[test]
    fn test_amount_needs_two_decimals() {
        assert!(find_amounts("14 pezzi").is_empty());
        assert!(find_amounts("1.234").is_empty());
        assert_eq!(find_amounts("saldo 0,5 / 0,50"), vec![0.5]);
    }

    #[test]
    fn test_first_eur_amount() {
        let line = "NUMERO DI POSIZIONI 7 62.348,68 EUR 1,00";
        assert_eq!(first_eur_amount(line), Some(62348.68));
        assert_eq!(first_eur_amount("totale 62.348,68EUR"), Some(62348.68));
        assert_eq!(first_eur_amount("NUMERO DI POSIZIONI 7 62.348,68"), None);
    }

    #[test]
    fn test_extract_isin() {
        assert_eq!(extract_isin("DE000A1EWWW0"), Some("DE000A1EWWW0"));
        assert_eq!(extract_isin("US0378331005 Apple Inc"), Some("US0378331005"));
        assert_eq!(extract_isin("DE000A1EWWW"), None);
        assert_eq!(extract_isin("de000a1ewww0"), None);
        assert_eq!(extract_isin("XDE000A1EWWW0"), None);
    }

    #[test]
    fn test_validate_pdf() {
        let limits = ImportLimits::default();
        assert!(matches!(
            validate_pdf(b"%PDF", &limits),
            Err(StatementError::MalformedDocument(MalformedKind::Header, _))
        ));
        assert!(matches!(
            validate_pdf(b"<html>not a pdf</html>", &limits),
            Err(StatementError::MalformedDocument(MalformedKind::Header, _))
        ));
        assert!(validate_pdf(b"%PDF-1.7\n%%EOF", &limits).is_ok());

        let tight = ImportLimits { max_pdf_size: 10 };
        assert!(matches!(
            validate_pdf(b"%PDF-1.7\n0123456789", &tight),
            Err(StatementError::DocumentTooLarge { size: 19, max: 10 })
        ));
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let limits = ImportLimits::default();
        let result = extract_pdf_text(b"definitely not a pdf document", &limits);
        assert!(matches!(
            result,
            Err(StatementError::MalformedDocument(MalformedKind::Header, _))
        ));
    }

    #[test]
    fn test_extract_truncated_pdf_is_malformed() {
        let limits = ImportLimits::default();
        let result = extract_pdf_text(b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog", &limits);
        assert!(matches!(
            result,
            Err(StatementError::MalformedDocument(MalformedKind::Content, _))
        ));
    }

    #[test]
    fn test_extract_generated_pdf() {
        let bytes = statement_pdf(&[
            &["Trade Republic Bank GmbH", "Conto corrente 2.646,02 EUR 4.528,82 EUR"],
            &["NUMERO DI POSIZIONI 2 1.000,00 EUR"],
        ]);
        let limits = ImportLimits::default();

        let pages = extract_pdf_pages(&bytes, &limits).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("Conto corrente"));
        assert!(pages[1].contains("NUMERO DI POSIZIONI"));

        let text = extract_pdf_text(&bytes, &limits).unwrap();
        assert!(text.find("Conto corrente").unwrap() < text.find("NUMERO DI POSIZIONI").unwrap());
    }

    #[test]
    fn test_blank_page_yields_empty_text() {
        let bytes = statement_pdf(&[&["Page one"], &[], &["Page three"]]);
        let limits = ImportLimits::default();

        let pages = extract_pdf_pages(&bytes, &limits).unwrap();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("Page one"));
        assert_eq!(pages[1], "");
        assert!(pages[2].contains("Page three"));

        let text = extract_pdf_text(&bytes, &limits).unwrap();
        assert_eq!(text, pages.join("\n"));
    }

    #[test]
    fn test_validation_failures_are_flagged() {
        let limits = ImportLimits { max_pdf_size: 10 };
        let header = validate_pdf(b"not a pdf at all", &ImportLimits::default()).unwrap_err();
        let too_small = validate_pdf(b"%PDF", &limits).unwrap_err();
        let too_large = validate_pdf(b"%PDF-1.7\n0123456789", &limits).unwrap_err();

        assert!(header.is_validation_failure());
        assert!(too_small.is_validation_failure());
        assert!(too_large.is_validation_failure());
        assert!(!StatementError::BalanceNotFound.is_validation_failure());
        assert!(!StatementError::MalformedDocument(MalformedKind::Content, String::new())
            .is_validation_failure());
    }

    proptest! {
        #[test]
        fn prop_formatted_amount_canonicalizes(cents in 0u64..10_000_000_000u64) {
            let whole = cents / 100;
            let digits = whole.to_string();
            let mut grouped = String::new();
            for (i, ch) in digits.chars().enumerate() {
                if i > 0 && (digits.len() - i) % 3 == 0 {
                    grouped.push('.');
                }
                grouped.push(ch);
            }
            let token = format!("{},{:02}", grouped, cents % 100);
            let line = format!("Saldo {} EUR", token);

            let expected = cents as f64 / 100.0;
            prop_assert_eq!(last_amount(&line), Some(expected));
            prop_assert_eq!(first_eur_amount(&line), Some(expected));
        }
    }
}
