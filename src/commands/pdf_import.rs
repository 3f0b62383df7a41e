//! PDF Import Commands
//!
//! Imports a Trade Republic cash statement and securities statement as one
//! unit. Both halves must parse before a snapshot is built, and the stored
//! snapshot is only replaced once the whole import has succeeded.

use crate::pdf_import::trade_republic::{
    ParsedCashStatement, ParsedSecuritiesStatement, TradeRepublicParser,
};
use crate::pdf_import::{
    extract_pdf_text, extract_pdf_text_from_path, ImportLimits, Result, StatementError,
};
use crate::snapshot::{AggregateSnapshot, SnapshotStore};
use std::path::Path;

/// Parse both statements and combine them
pub fn import_statements(
    cash_pdf: &[u8],
    securities_pdf: &[u8],
    limits: &ImportLimits,
) -> Result<AggregateSnapshot> {
    log::info!(
        "PDF Import: Starting import ({} + {} bytes)",
        cash_pdf.len(),
        securities_pdf.len()
    );

    let parser = TradeRepublicParser::new();
    let cash = parser.parse_cash_pdf(cash_pdf, limits)?;
    let securities = parser.parse_securities_pdf(securities_pdf, limits)?;

    Ok(AggregateSnapshot::from_statements(cash, securities))
}

/// Same as [`import_statements`], with both statements parsed in parallel
pub async fn import_statements_async(
    cash_pdf: Vec<u8>,
    securities_pdf: Vec<u8>,
    limits: ImportLimits,
) -> Result<AggregateSnapshot> {
    let (cash, securities) = tokio::join!(
        tokio::task::spawn_blocking(move || {
            TradeRepublicParser::new().parse_cash_pdf(&cash_pdf, &limits)
        }),
        tokio::task::spawn_blocking(move || {
            TradeRepublicParser::new().parse_securities_pdf(&securities_pdf, &limits)
        })
    );

    let cash: ParsedCashStatement =
        cash.map_err(|e| StatementError::TaskFailed(e.to_string()))??;
    let securities: ParsedSecuritiesStatement =
        securities.map_err(|e| StatementError::TaskFailed(e.to_string()))??;

    Ok(AggregateSnapshot::from_statements(cash, securities))
}

/// Import and, on success only, make the result the current snapshot
pub fn import_into(
    store: &SnapshotStore,
    cash_pdf: &[u8],
    securities_pdf: &[u8],
    limits: &ImportLimits,
) -> Result<AggregateSnapshot> {
    let snapshot = import_statements(cash_pdf, securities_pdf, limits).map_err(|e| {
        log::error!("PDF Import: Import rejected, keeping previous snapshot: {}", e);
        e
    })?;
    store.replace(snapshot.clone());
    Ok(snapshot)
}

/// Async variant of [`import_into`]
pub async fn import_into_async(
    store: &SnapshotStore,
    cash_pdf: Vec<u8>,
    securities_pdf: Vec<u8>,
    limits: ImportLimits,
) -> Result<AggregateSnapshot> {
    let snapshot = import_statements_async(cash_pdf, securities_pdf, limits)
        .await
        .map_err(|e| {
            log::error!("PDF Import: Import rejected, keeping previous snapshot: {}", e);
            e
        })?;
    store.replace(snapshot.clone());
    Ok(snapshot)
}

/// Extract raw text from PDF for debugging
pub fn extract_pdf_raw_text(pdf_path: &Path, limits: &ImportLimits) -> Result<String> {
    extract_pdf_text_from_path(pdf_path, limits)
}

/// Detect which bank a PDF is from
pub fn detect_pdf_bank(pdf_bytes: &[u8], limits: &ImportLimits) -> Result<Option<String>> {
    let content = extract_pdf_text(pdf_bytes, limits)?;
    let parser = TradeRepublicParser::new();

    if parser.detect(&content) {
        return Ok(Some(parser.bank_name().to_string()));
    }

    Ok(None)
}
