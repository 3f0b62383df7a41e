//! Trade Republic PDF Parser
//!
//! Reads the Italian-language cash account and securities account
//! statements issued by Trade Republic.

use super::positions::reconstruct_holdings;
use super::{
    extract_pdf_text, first_eur_amount, last_amount, ImportLimits, ParseWarning, Result,
    StatementError, WarningSeverity,
};
use serde::{Deserialize, Serialize};

/// Row carrying the balance progression of the current account
const CASH_MARKER: &str = "Conto corrente";
/// Summary section used by the alternate cash layout
const CASH_FALLBACK_MARKER: &str = "Citibank";
/// Summary row with the number of positions and the portfolio value
const TOTAL_MARKER: &str = "NUMERO DI POSIZIONI";

/// Closing balance of a cash account statement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedCashStatement {
    pub balance: f64,
}

/// One security held in the securities account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub identifier: String,
    pub name: String,
    pub quantity: f64,
    /// Not derived from the statement, always zero
    pub market_value: f64,
}

/// Portfolio value plus the holdings in order of appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSecuritiesStatement {
    pub total_value: f64,
    pub holdings: Vec<Holding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ParseWarning>,
}

pub struct TradeRepublicParser {
    detect_patterns: Vec<&'static str>,
}

impl Default for TradeRepublicParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeRepublicParser {
    pub fn new() -> Self {
        Self {
            detect_patterns: vec!["Trade Republic", "TRADE REPUBLIC", "Trade Republic Bank GmbH"],
        }
    }

    /// Whether the text carries a Trade Republic letterhead
    pub fn detect(&self, content: &str) -> bool {
        self.detect_patterns
            .iter()
            .any(|pattern| content.contains(pattern))
    }

    pub fn bank_name(&self) -> &'static str {
        "Trade Republic"
    }

    /// Closing balance of a cash statement
    ///
    /// The first `Conto corrente` row with an amount wins and its rightmost
    /// amount is the balance. Statements without such a row report the
    /// balance next to `Citibank` instead.
    pub fn parse_cash_statement(&self, content: &str) -> Result<ParsedCashStatement> {
        if !self.detect(content) {
            log::info!("PDF Import: Cash statement has no {} letterhead", self.bank_name());
        }

        if let Some(balance) = last_amount_on_marker_line(content, CASH_MARKER) {
            log::info!("PDF Import: Cash balance {} from '{}' row", balance, CASH_MARKER);
            return Ok(ParsedCashStatement { balance });
        }

        if let Some(balance) = last_amount_on_marker_line(content, CASH_FALLBACK_MARKER) {
            log::info!(
                "PDF Import: Cash balance {} from '{}' summary",
                balance,
                CASH_FALLBACK_MARKER
            );
            return Ok(ParsedCashStatement { balance });
        }

        log::warn!("PDF Import: No balance line found in cash statement");
        Err(StatementError::BalanceNotFound)
    }

    /// Portfolio total only, failing when the summary row is missing
    pub fn parse_securities_total(&self, content: &str) -> Result<f64> {
        last_amount_on_marker_line(content, TOTAL_MARKER).ok_or_else(|| {
            log::warn!("PDF Import: No '{}' line found", TOTAL_MARKER);
            StatementError::PortfolioTotalNotFound
        })
    }

    /// Portfolio total and the individual holdings
    ///
    /// Never fails: a missing total becomes zero, missing names and
    /// quantities become empty / zero, and each such fallback is recorded
    /// as a warning.
    pub fn parse_securities_statement(&self, content: &str) -> ParsedSecuritiesStatement {
        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let mut warnings = Vec::new();

        if !self.detect(content) {
            warnings.push(ParseWarning::new(
                WarningSeverity::Info,
                "bank",
                format!("No {} letterhead found", self.bank_name()),
                "",
            ));
        }

        let total = lines
            .iter()
            .filter(|l| l.contains(TOTAL_MARKER))
            .find_map(|l| first_eur_amount(l));

        let total_value = match total {
            Some(value) => {
                log::info!("PDF Import: Portfolio total {}", value);
                value
            }
            None => {
                log::warn!("PDF Import: No portfolio total found, using 0");
                warnings.push(ParseWarning::new(
                    WarningSeverity::Warning,
                    "total_value",
                    format!("No '{}' line with an EUR amount", TOTAL_MARKER),
                    "",
                ));
                0.0
            }
        };

        let (holdings, position_warnings) = reconstruct_holdings(
            lines.iter().copied().filter(|l| !is_vat_boilerplate(l)),
        );
        warnings.extend(position_warnings);

        log::info!("PDF Import: Found {} holding(s)", holdings.len());

        ParsedSecuritiesStatement {
            total_value,
            holdings,
            warnings,
        }
    }

    /// Extract and parse a cash statement PDF
    pub fn parse_cash_pdf(
        &self,
        bytes: &[u8],
        limits: &ImportLimits,
    ) -> Result<ParsedCashStatement> {
        let content = extract_pdf_text(bytes, limits)?;
        self.parse_cash_statement(&content)
    }

    /// Extract a securities statement PDF and read its total only
    pub fn parse_securities_total_pdf(&self, bytes: &[u8], limits: &ImportLimits) -> Result<f64> {
        let content = extract_pdf_text(bytes, limits)?;
        self.parse_securities_total(&content)
    }

    /// Extract and parse a securities statement PDF with its holdings
    pub fn parse_securities_pdf(
        &self,
        bytes: &[u8],
        limits: &ImportLimits,
    ) -> Result<ParsedSecuritiesStatement> {
        let content = extract_pdf_text(bytes, limits)?;
        Ok(self.parse_securities_statement(&content))
    }
}

/// VAT disclosure footers interleaved between position rows
fn is_vat_boilerplate(line: &str) -> bool {
    line.contains("IVA") || line.contains("P. IVA")
}

/// Rightmost amount of the first line containing `marker` that has one
fn last_amount_on_marker_line(content: &str, marker: &str) -> Option<f64> {
    content
        .lines()
        .filter(|line| line.contains(marker))
        .find_map(last_amount)
}
