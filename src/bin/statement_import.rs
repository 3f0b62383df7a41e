//! Command line front-end for the statement importer.
//!
//! Usage:
//!   statement_import text <pdf>
//!   statement_import cash <pdf>
//!   statement_import securities <pdf> [--total-only]
//!   statement_import import <cash_pdf> <securities_pdf>
//!
//! Output: JSON (or raw text for `text`) on stdout, logs on stderr
//! Exit codes:
//!   0 - Success
//!   2 - PDF read error
//!   3 - PDF extraction or parse error
//!   4 - PDF validation failed

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use elara_import::commands::pdf_import::{extract_pdf_raw_text, import_into_async};
use elara_import::pdf_import::trade_republic::TradeRepublicParser;
use elara_import::{ImportLimits, SnapshotStore, StatementError};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(
    name = "statement_import",
    about = "Read Trade Republic cash and securities statements"
)]
struct Cli {
    /// Maximum accepted PDF size in megabytes.
    #[arg(long, global = true, default_value_t = 100)]
    max_size_mb: usize,

    /// Log debug output to stderr.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the extracted text of a PDF.
    Text { pdf: PathBuf },
    /// Print the closing balance of a cash statement.
    Cash { pdf: PathBuf },
    /// Print the portfolio total and holdings of a securities statement.
    Securities {
        pdf: PathBuf,

        /// Only read the portfolio total, failing if it is missing.
        #[arg(long, default_value_t = false)]
        total_only: bool,
    },
    /// Combine a cash and a securities statement into one snapshot.
    Import {
        cash_pdf: PathBuf,
        securities_pdf: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(StatementError::from)
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn limits_from_mb(max_size_mb: usize) -> ImportLimits {
    ImportLimits {
        max_pdf_size: max_size_mb.saturating_mul(1024 * 1024),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let limits = limits_from_mb(cli.max_size_mb);
    let parser = TradeRepublicParser::new();

    match cli.command {
        Commands::Text { pdf } => {
            let text = extract_pdf_raw_text(&pdf, &limits)
                .with_context(|| format!("Failed to extract {}", pdf.display()))?;
            print!("{}", text);
        }
        Commands::Cash { pdf } => {
            let cash = parser.parse_cash_pdf(&read_pdf(&pdf)?, &limits)?;
            print_json(&cash)?;
        }
        Commands::Securities { pdf, total_only } => {
            let bytes = read_pdf(&pdf)?;
            if total_only {
                let total_value = parser.parse_securities_total_pdf(&bytes, &limits)?;
                print_json(&json!({ "total_value": total_value }))?;
            } else {
                print_json(&parser.parse_securities_pdf(&bytes, &limits)?)?;
            }
        }
        Commands::Import {
            cash_pdf,
            securities_pdf,
        } => {
            let store = SnapshotStore::new();
            let snapshot =
                import_into_async(&store, read_pdf(&cash_pdf)?, read_pdf(&securities_pdf)?, limits)
                    .await?;
            if !snapshot.complete {
                log::warn!(
                    "Import finished with {} warning(s)",
                    snapshot.warnings.len()
                );
            }
            print_json(&snapshot)?;
        }
    }

    Ok(())
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<StatementError>() {
        Some(StatementError::Io(_)) => 2,
        Some(e) if e.is_validation_failure() => 4,
        _ => 3,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elara_import::pdf_import::MalformedKind;

    #[test]
    fn test_exit_status_validation_failures() {
        let header = StatementError::MalformedDocument(MalformedKind::Header, "no header".into());
        assert_eq!(exit_status(&anyhow::Error::from(header)), 4);

        let too_large = StatementError::DocumentTooLarge { size: 20, max: 10 };
        let err = anyhow::Error::from(too_large).context("Failed to extract big.pdf");
        assert_eq!(exit_status(&err), 4);
    }

    #[test]
    fn test_exit_status_parse_and_read_errors() {
        let content = StatementError::MalformedDocument(MalformedKind::Content, "bad xref".into());
        assert_eq!(exit_status(&anyhow::Error::from(content)), 3);
        assert_eq!(exit_status(&anyhow::Error::from(StatementError::BalanceNotFound)), 3);
        assert_eq!(exit_status(&anyhow::anyhow!("unrelated")), 3);

        let missing = read_pdf(Path::new("/nonexistent/statement.pdf")).unwrap_err();
        assert_eq!(exit_status(&missing), 2);
    }

    #[test]
    fn test_size_limit_saturates() {
        assert_eq!(limits_from_mb(100).max_pdf_size, 100 * 1024 * 1024);
        assert_eq!(limits_from_mb(usize::MAX).max_pdf_size, usize::MAX);
    }
}
